//! Approval override
//!
//! Cross-bank DVP settlement waits on an external payment system. That
//! system is modeled by a single configuration code stored in the
//! ledger, read into a [`SettlementPolicy`] value at the start of each
//! operation and passed explicitly from there — workflows never consult
//! ambient state.
//!
//! Code → outcome mapping:
//!
//! | code | outcome |
//! |------|---------|
//! | 0, 22 | Finished |
//! | 1 | Waiting4Payment |
//! | 2 | PaymentError |
//! | 3, 21 | Cancelled |
//! | 5 | Finished, or PaymentError when the seller's live registered holding is short |
//!
//! Unknown codes settle as Finished. The policy applies only to matched
//! cross-bank amount-bearing transfers; in-bank and free-of-payment
//! transfers always finalize as Finished at match time.

use crate::core::time::Timestamp;
use crate::engine::SettlementError;
use crate::ledger::{get_json, put_json, LedgerError, LedgerStore};
use crate::models::security::Security;
use crate::models::transaction::{Transaction, TxStatus};
use crate::posting::post_transfer;
use crate::reservation;
use tracing::info;

/// Ledger key holding the payment-system outcome code.
pub const POLICY_KEY: &str = "approveflag";

/// Payment-system outcome policy, resolved per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPolicy {
    code: String,
}

impl SettlementPolicy {
    /// Build a policy from a raw code string.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    /// Read the stored code, defaulting to `"0"` (settle immediately)
    /// when none is configured.
    pub fn load(store: &impl LedgerStore) -> Result<Self, LedgerError> {
        let code = match store.get(POLICY_KEY)? {
            Some(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            None => "0".to_string(),
        };
        Ok(Self { code })
    }

    /// Persist a new outcome code.
    pub fn store(store: &mut impl LedgerStore, code: &str) -> Result<(), LedgerError> {
        store.put(POLICY_KEY, code.as_bytes().to_vec())
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether the override governs this leg at all.
    pub fn applies_to(&self, tx: &Transaction) -> bool {
        tx.is_cross_bank() && !tx.is_fop()
    }

    /// Resolve the final status of a matched leg.
    ///
    /// Code 5 consults the seller's live registered holding in the
    /// security registry at resolution time, not the snapshot taken at
    /// validation.
    pub fn resolve(
        &self,
        store: &impl LedgerStore,
        tx: &Transaction,
    ) -> Result<TxStatus, LedgerError> {
        Ok(match self.code.as_str() {
            "1" => TxStatus::Waiting4Payment,
            "2" => TxStatus::PaymentError,
            "3" | "21" => TxStatus::Cancelled,
            "5" => {
                let held = get_json::<Security>(store, &tx.security_id)?
                    .and_then(|s| s.owner(tx.sell_side_account()).map(|o| o.owned_amount))
                    .unwrap_or(0);
                if tx.security_amount > held {
                    TxStatus::PaymentError
                } else {
                    TxStatus::Finished
                }
            }
            _ => TxStatus::Finished,
        })
    }
}

/// Re-apply the outcome policy to a previously Waiting4Payment or
/// PaymentError pair, simulating the asynchronous confirmation callback
/// from the payment system.
///
/// Returns the updated records, the addressed leg first. A Cancelled
/// outcome reverses the pair's postings and hands back both legs'
/// reservations; a PaymentError outcome keeps postings in place until
/// end-of-day expiry resolves them.
pub fn submit_approve(
    store: &mut impl LedgerStore,
    tx_id: &str,
    policy: &SettlementPolicy,
    now: &Timestamp,
) -> Result<Vec<Transaction>, SettlementError> {
    let mut tx: Transaction = get_json(store, tx_id)?
        .ok_or_else(|| SettlementError::TransactionNotFound(tx_id.to_string()))?;
    if !matches!(
        tx.status,
        TxStatus::Waiting4Payment | TxStatus::PaymentError
    ) {
        return Err(SettlementError::IneligibleStatus {
            tx_id: tx.tx_id.clone(),
            status: tx.status,
        });
    }

    let final_status = policy.resolve(store, &tx)?;
    info!(%tx_id, code = policy.code(), ?final_status, "approval override applied");

    let mut counterpart: Option<Transaction> = if tx.matched_tx_id.is_empty() {
        None
    } else {
        get_json(store, &tx.matched_tx_id)?
    };

    if final_status == TxStatus::Cancelled {
        // Undo the pair's postings once and hand back both legs'
        // reservations.
        post_transfer(store, &tx, true, now)?;
        release_reservation(store, &tx, now)?;
        if let Some(cp) = &counterpart {
            release_reservation(store, cp, now)?;
        }
    }

    tx.apply_status(final_status, None, now);
    put_json(store, &tx.tx_id.clone(), &tx)?;
    let mut updated = vec![tx];

    if let Some(cp) = counterpart.as_mut() {
        cp.apply_status(final_status, None, now);
        put_json(store, &cp.tx_id.clone(), cp)?;
        updated.push(cp.clone());
    }
    Ok(updated)
}

/// Hand a leg's reserved pending balance back to the sell side.
pub(crate) fn release_reservation(
    store: &mut impl LedgerStore,
    tx: &Transaction,
    now: &Timestamp,
) -> Result<(), SettlementError> {
    reservation::release(
        store,
        &tx.security_id,
        tx.payment,
        tx.sell_side_account(),
        tx.buy_side_account(),
        now,
    )?;
    Ok(())
}
