//! Submission validation
//!
//! Turns a raw positional-argument submission into a persisted
//! [`Transaction`] record. Business failures never bubble to the caller
//! as errors: the submission is persisted as a Cancelled record carrying
//! the reason, so every submission stays auditable. Only ledger I/O
//! failures abort the invocation.
//!
//! Preconditions run in a fixed order, each with its own rejection
//! message: field well-formedness, bank registration, security
//! existence, pending-balance reservation, and (for Sell submissions)
//! the balance check against the submitting account.

use crate::core::time::Timestamp;
use crate::fingerprint::fingerprints;
use crate::ledger::{get_json, LedgerError, LedgerStore};
use crate::models::account::Account;
use crate::models::bank::Bank;
use crate::models::security::Security;
use crate::models::transaction::{Transaction, TxStatus, TxType};
use crate::reservation::{self, ReservationError};
use tracing::{debug, warn};

/// Raw submission fields, still string-typed as received from the
/// operation surface.
#[derive(Debug, Clone)]
pub struct Submission {
    pub tx_type: String,
    pub from: String,
    pub to: String,
    pub security_id: String,
    pub security_amount: String,
    pub payment: String,
    pub enqueue: String,
}

/// Rejection message for a submission whose payment exceeds what the
/// account can commit.
pub const MSG_INSUFFICIENT_BALANCE: &str = "insufficient balance";

fn parse_amount(raw: &str, field: &str) -> Result<i64, String> {
    raw.parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| format!("{field} must be a non-negative integer"))
}

fn bank_prefix(account_id: &str) -> Option<String> {
    // The leading bank code must be three ASCII digits; checking bytes
    // also keeps the slice below on a char boundary for any input.
    let code = account_id.as_bytes().get(..3)?;
    if !code.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("BK{}", &account_id[..3]))
}

struct Parsed {
    tx_type: TxType,
    security_amount: i64,
    payment: i64,
    enqueue: bool,
    bank_from: String,
    bank_to: String,
}

fn parse_fields(sub: &Submission) -> Result<Parsed, String> {
    let tx_type =
        TxType::parse(&sub.tx_type).ok_or_else(|| "invalid transaction type".to_string())?;
    if sub.from.is_empty() || sub.to.is_empty() {
        return Err("from and to accounts are required".to_string());
    }
    if sub.from == sub.to {
        return Err("from and to accounts must differ".to_string());
    }
    if sub.security_id.is_empty() {
        return Err("security id is required".to_string());
    }
    let security_amount = parse_amount(&sub.security_amount, "security amount")?;
    let payment = parse_amount(&sub.payment, "payment")?;
    let enqueue = match sub.enqueue.as_str() {
        "true" => true,
        "false" => false,
        _ => return Err("enqueue flag must be true or false".to_string()),
    };
    let bank_from = bank_prefix(&sub.from)
        .ok_or_else(|| "from account id must start with a 3-digit bank code".to_string())?;
    let bank_to = bank_prefix(&sub.to)
        .ok_or_else(|| "to account id must start with a 3-digit bank code".to_string())?;
    Ok(Parsed {
        tx_type,
        security_amount,
        payment,
        enqueue,
        bank_from,
        bank_to,
    })
}

fn reject(mut tx: Transaction, reason: String, now: &Timestamp) -> Transaction {
    warn!(from = %tx.from, to = %tx.to, %reason, "submission rejected");
    tx.status = TxStatus::Cancelled;
    tx.memo = reason.clone();
    tx.error_message = reason;
    tx.updated_at = now.as_str().to_string();
    tx
}

/// Validate a submission, performing the pending-balance reservation as
/// a side effect when all preconditions hold.
///
/// Returns the record to persist: Pending on success, Cancelled with a
/// reason otherwise. Only ledger failures surface as `Err`.
pub fn validate(
    store: &mut impl LedgerStore,
    sub: &Submission,
    now: &Timestamp,
) -> Result<Transaction, LedgerError> {
    let mut tx = Transaction::draft(now);
    tx.from = sub.from.clone();
    tx.to = sub.to.clone();
    tx.security_id = sub.security_id.clone();
    // Provisional id so even a record rejected mid-parse lands under a
    // usable audit key; overwritten with the same value on success.
    let letter = TxType::parse(&sub.tx_type).map(|t| t.letter()).unwrap_or('X');
    tx.tx_id = format!(
        "{}{}{}{}",
        bank_prefix(&sub.from).unwrap_or_else(|| "BKXXX".to_string()),
        letter,
        sub.from,
        now.as_str()
    );

    let parsed = match parse_fields(sub) {
        Ok(parsed) => parsed,
        Err(reason) => return Ok(reject(tx, reason, now)),
    };
    tx.tx_type = parsed.tx_type;
    tx.security_amount = parsed.security_amount;
    tx.payment = parsed.payment;
    tx.queued = parsed.enqueue;
    tx.bank_from = parsed.bank_from.clone();
    tx.bank_to = parsed.bank_to.clone();
    tx.tx_id = format!(
        "{}{}{}{}",
        parsed.bank_from,
        parsed.tx_type.letter(),
        sub.from,
        now.as_str()
    );

    if get_json::<Bank>(store, &parsed.bank_from)?.is_none() {
        let reason = format!("bank {} is not registered", parsed.bank_from);
        return Ok(reject(tx, reason, now));
    }
    if get_json::<Security>(store, &sub.security_id)?.is_none() {
        let reason = format!("security {} not found", sub.security_id);
        return Ok(reject(tx, reason, now));
    }

    let fp = fingerprints(
        parsed.tx_type,
        &sub.from,
        &sub.to,
        &parsed.bank_from,
        &parsed.bank_to,
        &sub.security_id,
        parsed.security_amount,
        parsed.payment,
    );
    tx.full_index = fp.full_index;
    tx.short_index = fp.short_index;

    // Reserve on the sell direction: the account giving up balance.
    let sender = tx.sell_side_account().to_string();
    let receiver = tx.buy_side_account().to_string();
    match reservation::reserve(store, &sub.security_id, parsed.payment, &sender, &receiver, now) {
        Ok(()) => {}
        Err(ReservationError::Ledger(e)) => return Err(e),
        Err(e) => return Ok(reject(tx, e.to_string(), now)),
    }

    let account: Account = match get_json(store, &sub.from)? {
        Some(account) => account,
        None => {
            release_quietly(store, &tx, &sender, &receiver, now)?;
            let reason = format!("account {} not found", sub.from);
            return Ok(reject(tx, reason, now));
        }
    };
    let asset = match account.asset(&sub.security_id) {
        Some(asset) => asset.clone(),
        None => {
            release_quietly(store, &tx, &sender, &receiver, now)?;
            let reason = format!(
                "account {} has no asset entry for security {}",
                sub.from, sub.security_id
            );
            return Ok(reject(tx, reason, now));
        }
    };
    tx.from_balance = asset.balance;
    tx.from_position = asset.position;
    tx.from_security_amount = asset.security_amount;
    tx.from_pending_balance = asset.pending_balance;

    // Only the Sell submission commits cash from its own account, so
    // only it is balance-checked here.
    if parsed.tx_type == TxType::Sell {
        let sufficient = parsed.payment <= asset.balance
            && parsed.payment <= asset.position
            && parsed.security_amount <= asset.security_amount
            && parsed.payment <= asset.pending_balance;
        if !sufficient {
            release_quietly(store, &tx, &sender, &receiver, now)?;
            return Ok(reject(tx, MSG_INSUFFICIENT_BALANCE.to_string(), now));
        }
    }

    tx.status = TxStatus::Pending;
    debug!(tx_id = %tx.tx_id, "submission validated");
    Ok(tx)
}

fn release_quietly(
    store: &mut impl LedgerStore,
    tx: &Transaction,
    sender: &str,
    receiver: &str,
    now: &Timestamp,
) -> Result<(), LedgerError> {
    match reservation::release(store, &tx.security_id, tx.payment, sender, receiver, now) {
        Ok(()) | Err(ReservationError::AccountNotFound(_))
        | Err(ReservationError::AssetNotFound { .. })
        | Err(ReservationError::Exhausted { .. }) => Ok(()),
        Err(ReservationError::Ledger(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{put_json, MemoryLedger};
    use crate::models::account::{Account, Asset};
    use crate::models::bank::Bank;
    use crate::models::security::{Owner, Security};

    fn seed(store: &mut MemoryLedger) {
        for (account_id, bank_id) in [("004000000001", "BK004"), ("002000000001", "BK002")] {
            let mut account = Account::new(account_id, bank_id);
            let mut asset = Asset::new("A07103");
            asset.security_amount = 500_000;
            asset.balance = 1_000_000;
            asset.position = 1_000_000;
            asset.pending_balance = 1_000_000;
            account.assets.push(asset);
            put_json(store, account_id, &account).unwrap();
            put_json(store, bank_id, &Bank::new(bank_id)).unwrap();
        }
        let mut security = Security::new("A07103");
        for (account_id, bank_id) in [("004000000001", "BK004"), ("002000000001", "BK002")] {
            security.owners.push(Owner {
                account_id: account_id.to_string(),
                bank_id: bank_id.to_string(),
                owned_amount: 1_000_000,
                owned_balance: 0,
                created_at: String::new(),
                updated_at: String::new(),
            });
        }
        put_json(store, "A07103", &security).unwrap();
    }

    fn sell() -> Submission {
        Submission {
            tx_type: "S".to_string(),
            from: "004000000001".to_string(),
            to: "002000000001".to_string(),
            security_id: "A07103".to_string(),
            security_amount: "102000".to_string(),
            payment: "100000".to_string(),
            enqueue: "true".to_string(),
        }
    }

    fn now() -> Timestamp {
        Timestamp::new("20180415070724")
    }

    #[test]
    fn test_valid_sell_becomes_pending() {
        let mut store = MemoryLedger::new();
        seed(&mut store);

        let tx = validate(&mut store, &sell(), &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        assert_eq!(tx.tx_id, "BK004S00400000000120180415070724");
        assert_eq!(tx.bank_from, "BK004");
        assert_eq!(tx.bank_to, "BK002");
        assert!(!tx.full_index.is_empty());
        assert_eq!(tx.from_balance, 1_000_000);
        // reservation already applied at validation time
        assert_eq!(tx.from_pending_balance, 900_000);
    }

    #[test]
    fn test_same_from_and_to_rejected() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.to = sub.from.clone();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
        assert_eq!(tx.error_message, "from and to accounts must differ");
    }

    #[test]
    fn test_unknown_bank_rejected() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.from = "999000000001".to_string();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
        assert!(tx.error_message.contains("BK999"));
    }

    #[test]
    fn test_unknown_security_rejected() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.security_id = "Z99999".to_string();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
        assert!(tx.error_message.contains("Z99999"));
    }

    #[test]
    fn test_insufficient_balance_releases_reservation() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.payment = "5000000".to_string();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
        assert_eq!(tx.error_message, MSG_INSUFFICIENT_BALANCE);

        let account: Account = get_json(&store, "004000000001").unwrap().unwrap();
        assert_eq!(account.asset("A07103").unwrap().pending_balance, 1_000_000);
    }

    #[test]
    fn test_non_ascii_account_id_rejected() {
        // Ids whose third byte falls inside a multibyte character must
        // reject cleanly, never slice mid-character.
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.from = "éé00000000".to_string();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
        assert!(tx.error_message.contains("bank code"));
    }

    #[test]
    fn test_non_digit_bank_code_rejected() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.to = "AB2000000001".to_string();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
        assert!(tx.error_message.contains("to account"));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let mut sub = sell();
        sub.security_amount = "-1".to_string();

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Cancelled);
    }

    #[test]
    fn test_buy_submission_skips_balance_check() {
        let mut store = MemoryLedger::new();
        seed(&mut store);
        let sub = Submission {
            tx_type: "B".to_string(),
            from: "002000000001".to_string(),
            to: "004000000001".to_string(),
            security_id: "A07103".to_string(),
            security_amount: "102000".to_string(),
            payment: "100000".to_string(),
            enqueue: "true".to_string(),
        };

        let tx = validate(&mut store, &sub, &now()).unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        // reservation runs against the sell-side (to) account
        let seller: Account = get_json(&store, "004000000001").unwrap().unwrap();
        assert_eq!(seller.asset("A07103").unwrap().pending_balance, 900_000);
    }
}
