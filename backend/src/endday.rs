//! End-of-day expiry
//!
//! Day close is the only mechanism bounding how long a leg may stay
//! live. Legs still Pending are cancelled and their reservation handed
//! back; matched-but-unsettled pairs (Waiting4Payment or PaymentError)
//! are cancelled on both sides with their postings reversed.
//!
//! Terminal legs are rejected, not re-cancelled, so re-running day
//! close over the same queue is idempotent.

use crate::approval::release_reservation;
use crate::core::time::Timestamp;
use crate::engine::SettlementError;
use crate::ledger::{get_json, put_json, LedgerStore};
use crate::models::transaction::{Transaction, TxStatus};
use crate::posting::post_transfer;
use tracing::info;

/// Expire one leg (and, for a matched pair, its counterpart).
///
/// Eligible statuses are Pending, Waiting4Payment and PaymentError;
/// anything else is reported as ineligible. Returns the updated
/// records, the addressed leg first.
pub fn run(
    store: &mut impl LedgerStore,
    tx_id: &str,
    now: &Timestamp,
) -> Result<Vec<Transaction>, SettlementError> {
    let mut tx: Transaction = get_json(store, tx_id)?
        .ok_or_else(|| SettlementError::TransactionNotFound(tx_id.to_string()))?;

    match tx.status {
        TxStatus::Pending => {
            info!(%tx_id, "expiring unmatched leg at day close");
            tx.cancel_with_memo(Transaction::MEMO_ENDDAY_UNMATCHED, now);
            release_reservation(store, &tx, now)?;
            put_json(store, &tx.tx_id.clone(), &tx)?;
            Ok(vec![tx])
        }
        TxStatus::Waiting4Payment | TxStatus::PaymentError => {
            info!(%tx_id, status = ?tx.status, "expiring unsettled pair at day close");
            // Postings were applied once for the pair at match time;
            // reverse them once here.
            post_transfer(store, &tx, true, now)?;
            release_reservation(store, &tx, now)?;
            tx.cancel_with_memo(Transaction::MEMO_ENDDAY_PAYMENT, now);
            put_json(store, &tx.tx_id.clone(), &tx)?;
            let mut updated = vec![tx.clone()];

            if !tx.matched_tx_id.is_empty() {
                if let Some(mut counterpart) =
                    get_json::<Transaction>(store, &tx.matched_tx_id)?
                {
                    if !counterpart.status.is_terminal() {
                        release_reservation(store, &counterpart, now)?;
                        counterpart.cancel_with_memo(Transaction::MEMO_ENDDAY_PAYMENT, now);
                        put_json(store, &counterpart.tx_id.clone(), &counterpart)?;
                        updated.push(counterpart);
                    }
                }
            }
            Ok(updated)
        }
        status => Err(SettlementError::IneligibleStatus {
            tx_id: tx.tx_id.clone(),
            status,
        }),
    }
}
