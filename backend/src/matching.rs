//! Matching engine
//!
//! Scans the current day's queue for the counter-leg of a freshly
//! validated Pending submission. Candidates are visited in submission
//! order, so when several share a fingerprint the oldest one wins.
//!
//! Two passes:
//!
//! 1. **Exact match** on `full_index` — settle: postings are applied,
//!    both legs are linked and transitioned through Matched to the
//!    final status the outcome policy dictates.
//! 2. **Probable mistype** on `short_index` only — no settlement; both
//!    legs stay Pending and carry a diagnostic memo naming the field
//!    that differs.

use crate::approval::{release_reservation, SettlementPolicy};
use crate::core::time::Timestamp;
use crate::engine::SettlementError;
use crate::ledger::LedgerStore;
use crate::models::day_ledger::DayQueue;
use crate::models::transaction::{Transaction, TxStatus};
use crate::posting::post_transfer;
use tracing::{debug, info};

/// Memo set on both legs when only the face-value quantity differs.
pub const MEMO_AMOUNT_MISMATCH: &str = "amount mismatch";
/// Memo set on both legs when only the payment differs.
pub const MEMO_FACE_VALUE_MISMATCH: &str = "face-value mismatch";

/// Outcome of one matching run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Settled against the named queued counterpart.
    Matched(String),
    /// Short-index hit against the named counterpart; memos written,
    /// both legs left Pending.
    Mismatch(String),
    /// No candidate; the leg queues as Pending.
    NoMatch,
}

fn is_counterpart(tx: &Transaction, cand: &Transaction) -> bool {
    cand.status == TxStatus::Pending
        && cand.tx_type != tx.tx_type
        && cand.from != tx.from
        && cand.tx_id != tx.tx_id
}

/// Run matching for a validated Pending leg against the day's queue.
///
/// On an exact match the counterpart's queue entry is updated in place;
/// the caller persists both records afterwards. `tx` itself is mutated
/// to its post-match state.
pub fn run(
    store: &mut impl LedgerStore,
    tx: &mut Transaction,
    queue: &mut DayQueue,
    policy: &SettlementPolicy,
    now: &Timestamp,
) -> Result<MatchResult, SettlementError> {
    debug_assert_eq!(tx.status, TxStatus::Pending);

    let exact = queue
        .iter()
        .find(|cand| cand.full_index == tx.full_index && is_counterpart(tx, cand))
        .map(|cand| cand.tx_id.clone());

    if let Some(counterpart_id) = exact {
        post_transfer(store, tx, false, now)?;

        // In-bank and free-of-payment transfers settle outright; only
        // cross-bank DVP consults the payment-system outcome.
        let final_status = if policy.applies_to(tx) {
            policy.resolve(store, tx)?
        } else {
            TxStatus::Finished
        };
        info!(
            tx_id = %tx.tx_id,
            counterpart = %counterpart_id,
            ?final_status,
            "legs matched"
        );

        if final_status == TxStatus::Cancelled {
            // The policy rejected the pair outright: undo the postings
            // and hand back both legs' reservations.
            post_transfer(store, tx, true, now)?;
            release_reservation(store, tx, now)?;
        }

        tx.apply_status(TxStatus::Matched, Some(&counterpart_id), now);
        tx.apply_status(final_status, None, now);

        let counterpart = queue
            .get_mut(&counterpart_id)
            .ok_or_else(|| SettlementError::TransactionNotFound(counterpart_id.clone()))?;
        counterpart.apply_status(TxStatus::Matched, Some(&tx.tx_id), now);
        counterpart.apply_status(final_status, None, now);
        if final_status == TxStatus::Cancelled {
            let counterpart = counterpart.clone();
            release_reservation(store, &counterpart, now)?;
        }
        return Ok(MatchResult::Matched(counterpart_id));
    }

    let near = queue
        .iter()
        .find(|cand| cand.short_index == tx.short_index && is_counterpart(tx, cand))
        .map(|cand| (cand.tx_id.clone(), cand.security_amount, cand.payment));

    if let Some((counterpart_id, cand_amount, cand_payment)) = near {
        let memo = if cand_amount != tx.security_amount {
            MEMO_AMOUNT_MISMATCH
        } else if cand_payment != tx.payment {
            MEMO_FACE_VALUE_MISMATCH
        } else {
            // Short indexes equal with all trade fields equal would be
            // an exact match; differing banks or accounts change the
            // short index too. Treat as quantity noise.
            MEMO_AMOUNT_MISMATCH
        };
        debug!(tx_id = %tx.tx_id, counterpart = %counterpart_id, memo, "probable mistyped counterpart");

        // Cross-link the suspect pair so operators can find both legs
        // from either record; the statuses stay Pending.
        tx.memo = memo.to_string();
        tx.matched_tx_id = counterpart_id.clone();
        tx.updated_at = now.as_str().to_string();
        if let Some(counterpart) = queue.get_mut(&counterpart_id) {
            counterpart.memo = memo.to_string();
            counterpart.matched_tx_id = tx.tx_id.clone();
            counterpart.updated_at = now.as_str().to_string();
        }
        return Ok(MatchResult::Mismatch(counterpart_id));
    }

    Ok(MatchResult::NoMatch)
}
