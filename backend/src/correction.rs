//! Correction workflow
//!
//! A mistyped submission cannot be edited in place: terminal records
//! are immutable and Pending ones are live matching candidates. A
//! correction instead supersedes the erroneous record with a brand-new
//! one. The superseded record is cancelled with a cross-link
//! (`correction_ref`) to its replacement, any counterpart that had
//! queued against it is cancelled too, and the corrected figures then
//! run the normal validate-match-settle cycle independently.

use crate::approval::release_reservation;
use crate::core::time::Timestamp;
use crate::engine::SettlementError;
use crate::ledger::{get_json, put_json, LedgerStore};
use crate::models::day_ledger::DayQueue;
use crate::models::transaction::{Transaction, TxStatus};
use tracing::{info, warn};

/// Why a superseded record cannot be corrected. Reported to the caller
/// on the new record, never as a hard failure.
pub fn supersession_blocker(superseded: Option<&Transaction>, tx_id: &str) -> Option<String> {
    match superseded {
        None => Some(format!("superseded transaction {tx_id} not found")),
        Some(tx) if tx.status != TxStatus::Pending => Some(format!(
            "superseded transaction {} is {:?}, only Pending records may be corrected",
            tx.tx_id, tx.status
        )),
        Some(_) => None,
    }
}

/// Cancel the superseded record and every queued record that had
/// corrected or queued against it.
///
/// The queue's entries are updated in place; stored records are written
/// immediately. Returns the ids of every record cancelled, the
/// superseded one first, so the caller can mirror the cancellations
/// into the day history.
pub fn supersede(
    store: &mut impl LedgerStore,
    queue: &mut DayQueue,
    superseded_id: &str,
    replacement_id: &str,
    now: &Timestamp,
) -> Result<Vec<String>, SettlementError> {
    let mut superseded: Transaction = get_json(store, superseded_id)?
        .ok_or_else(|| SettlementError::TransactionNotFound(superseded_id.to_string()))?;
    if superseded.status != TxStatus::Pending {
        return Err(SettlementError::IneligibleStatus {
            tx_id: superseded.tx_id.clone(),
            status: superseded.status,
        });
    }

    info!(%superseded_id, %replacement_id, "superseding record");
    superseded.correction_ref = replacement_id.to_string();
    superseded.cancel_with_memo(Transaction::MEMO_CORRECTED, now);
    release_reservation(store, &superseded, now)?;
    put_json(store, superseded_id, &superseded)?;
    if let Some(entry) = queue.get_mut(superseded_id) {
        *entry = superseded.clone();
    }

    let mut cancelled = vec![superseded_id.to_string()];

    // A counterpart may have queued against the erroneous original and
    // recorded it as its correction target; those go with it.
    for id in queue.tx_ids() {
        if id == superseded_id || id == replacement_id {
            continue;
        }
        let needs_cancel = queue
            .get(&id)
            .map(|t| t.correction_ref == superseded_id && t.status == TxStatus::Pending)
            .unwrap_or(false);
        if !needs_cancel {
            continue;
        }
        if let Some(entry) = queue.get_mut(&id) {
            entry.correction_ref = replacement_id.to_string();
            entry.cancel_with_memo(Transaction::MEMO_CORRECTED, now);
            let record = entry.clone();
            release_reservation(store, &record, now)?;
            put_json(store, &id, &record)?;
            cancelled.push(id);
        } else {
            warn!(tx_id = %id, "queued id vanished during correction scan");
        }
    }
    Ok(cancelled)
}
