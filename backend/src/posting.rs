//! Settlement poster
//!
//! Applies the balance movements of one matched transfer across up to
//! five aggregates: both accounts, the security's owner registry, and —
//! for cross-bank transfers only — both banks' rollups. `reverse = true`
//! applies the exact negation and is used by cancellation, approval
//! rejection and end-of-day expiry.
//!
//! All deltas are computed and validated against the non-negativity
//! guarantee before the first aggregate is written, so a rejected
//! posting leaves the ledger untouched.
//!
//! Polarity: the sell-side account gives up `payment` of balance and
//! position and takes on `security_amount` of face value; the buy-side
//! account mirrors with opposite sign. Sender and receiver deltas net
//! to zero system-wide.

use crate::core::time::Timestamp;
use crate::ledger::{get_json, put_json, LedgerError, LedgerStore};
use crate::models::account::Account;
use crate::models::bank::Bank;
use crate::models::security::Security;
use crate::models::transaction::Transaction;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PostingError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("account {account_id} has no asset entry for security {security_id}")]
    AssetNotFound {
        account_id: String,
        security_id: String,
    },

    #[error("security {0} not found")]
    SecurityNotFound(String),

    #[error("account {account_id} is not a registered owner of security {security_id}")]
    OwnerNotFound {
        account_id: String,
        security_id: String,
    },

    #[error("bank {0} not found")]
    BankNotFound(String),

    #[error("balance underflow on account {account_id}: {balance}")]
    BalanceUnderflow { account_id: String, balance: i64 },
}

/// Balances of both legs' accounts after the posting, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingOutcome {
    pub sender_balance: i64,
    pub receiver_balance: i64,
}

struct AccountDelta {
    account: Account,
    new_balance: i64,
    new_position: i64,
    new_security_amount: i64,
    /// Signed cash moved by this posting: positive when applying,
    /// negative when reversing. Accrued into `total_payment` so a
    /// posted-then-reversed pair nets back to zero.
    payment_moved: i64,
}

fn load_delta(
    store: &impl LedgerStore,
    account_id: &str,
    security_id: &str,
    amount_delta: i64,
    payment_delta: i64,
    payment_moved: i64,
) -> Result<AccountDelta, PostingError> {
    let account: Account = get_json(store, account_id)?
        .ok_or_else(|| PostingError::AccountNotFound(account_id.to_string()))?;
    let asset = account
        .asset(security_id)
        .ok_or_else(|| PostingError::AssetNotFound {
            account_id: account_id.to_string(),
            security_id: security_id.to_string(),
        })?;
    Ok(AccountDelta {
        new_balance: asset.balance + payment_delta,
        new_position: asset.position + payment_delta,
        new_security_amount: asset.security_amount + amount_delta,
        payment_moved,
        account,
    })
}

fn commit_delta(
    store: &mut impl LedgerStore,
    mut delta: AccountDelta,
    security_id: &str,
    now: &Timestamp,
) -> Result<(), PostingError> {
    let account_id = delta.account.account_id.clone();
    let asset = delta
        .account
        .asset_mut(security_id)
        .ok_or_else(|| PostingError::AssetNotFound {
            account_id: account_id.clone(),
            security_id: security_id.to_string(),
        })?;
    asset.balance = delta.new_balance;
    asset.position = delta.new_position;
    asset.security_amount = delta.new_security_amount;
    asset.total_payment += delta.payment_moved;
    delta.account.updated_at = now.as_str().to_string();
    put_json(store, &account_id, &delta.account)?;
    Ok(())
}

/// Apply (or with `reverse`, undo) the postings of one matched leg.
///
/// The transaction's own record is not touched; callers transition its
/// status separately.
pub fn post_transfer(
    store: &mut impl LedgerStore,
    tx: &Transaction,
    reverse: bool,
    now: &Timestamp,
) -> Result<PostingOutcome, PostingError> {
    let sign: i64 = if reverse { -1 } else { 1 };
    let sender = tx.sell_side_account().to_string();
    let receiver = tx.buy_side_account().to_string();

    debug!(
        tx_id = %tx.tx_id,
        %sender,
        %receiver,
        payment = tx.payment,
        amount = tx.security_amount,
        reverse,
        "posting transfer"
    );

    // Compute every delta before the first write.
    let sender_delta = load_delta(
        store,
        &sender,
        &tx.security_id,
        sign * tx.security_amount,
        -sign * tx.payment,
        sign * tx.payment,
    )?;
    let receiver_delta = load_delta(
        store,
        &receiver,
        &tx.security_id,
        -sign * tx.security_amount,
        sign * tx.payment,
        sign * tx.payment,
    )?;
    for delta in [&sender_delta, &receiver_delta] {
        if delta.new_balance < 0 || delta.new_position < 0 {
            return Err(PostingError::BalanceUnderflow {
                account_id: delta.account.account_id.clone(),
                balance: delta.new_balance.min(delta.new_position),
            });
        }
    }

    let mut security: Security = get_json(store, &tx.security_id)?
        .ok_or_else(|| PostingError::SecurityNotFound(tx.security_id.clone()))?;
    let sender_bank = sender_delta.account.bank_id.clone();
    let receiver_bank = receiver_delta.account.bank_id.clone();
    {
        let owner = security
            .owner_mut(&sender)
            .ok_or_else(|| PostingError::OwnerNotFound {
                account_id: sender.clone(),
                security_id: tx.security_id.clone(),
            })?;
        owner.owned_amount -= sign * tx.payment;
        owner.updated_at = now.as_str().to_string();
    }
    {
        let owner = security
            .owner_mut(&receiver)
            .ok_or_else(|| PostingError::OwnerNotFound {
                account_id: receiver.clone(),
                security_id: tx.security_id.clone(),
            })?;
        owner.owned_amount += sign * tx.payment;
        owner.updated_at = now.as_str().to_string();
    }
    {
        let total = security.total_for_bank_mut(&sender_bank, now.as_str());
        total.total_balance -= sign * tx.payment;
        total.updated_at = now.as_str().to_string();
    }
    {
        let total = security.total_for_bank_mut(&receiver_bank, now.as_str());
        total.total_balance += sign * tx.payment;
        total.updated_at = now.as_str().to_string();
    }
    security.updated_at = now.as_str().to_string();

    // Bank rollups move only for cross-bank transfers. Like the account
    // deltas they are oriented by the sell side, so a reversal through
    // either leg of a matched pair undoes the same rows.
    let bank_moves = if tx.is_cross_bank() {
        let mut seller_bank: Bank = get_json(store, &sender_bank)?
            .ok_or_else(|| PostingError::BankNotFound(sender_bank.clone()))?;
        let mut buyer_bank: Bank = get_json(store, &receiver_bank)?
            .ok_or_else(|| PostingError::BankNotFound(receiver_bank.clone()))?;
        seller_bank.apply_total(
            &tx.security_id,
            tx.payment,
            tx.security_amount,
            !reverse,
            &sender,
            now.as_str(),
        );
        buyer_bank.apply_total(
            &tx.security_id,
            tx.payment,
            tx.security_amount,
            reverse,
            &receiver,
            now.as_str(),
        );
        Some((seller_bank, buyer_bank))
    } else {
        None
    };

    let outcome = PostingOutcome {
        sender_balance: sender_delta.new_balance,
        receiver_balance: receiver_delta.new_balance,
    };

    commit_delta(store, sender_delta, &tx.security_id, now)?;
    commit_delta(store, receiver_delta, &tx.security_id, now)?;
    put_json(store, &tx.security_id, &security)?;
    if let Some((seller_bank, buyer_bank)) = bank_moves {
        put_json(store, &sender_bank, &seller_bank)?;
        put_json(store, &receiver_bank, &buyer_bank)?;
    }

    Ok(outcome)
}
