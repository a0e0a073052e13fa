//! Settlement engine
//!
//! The operation surface of the core. Each public method is one
//! external invocation: it reads its working set from the ledger, runs
//! the workflow synchronously to completion, and writes every touched
//! aggregate back. The engine holds no state of its own beyond the
//! injected store and clock, so concurrency control is entirely the
//! ledger's write-set validation.
//!
//! [`SettlementEngine::invoke`] exposes the same operations through the
//! string-dispatched positional-argument form used by the hosting
//! runtime.

use crate::approval::{self, release_reservation, SettlementPolicy};
use crate::core::time::Clock;
use crate::correction::{supersede, supersession_blocker};
use crate::endday;
use crate::ledger::{get_json, put_json, LedgerError, LedgerStore};
use crate::matching::{self, MatchResult};
use crate::models::day_ledger::{DayHistory, DayLedgerError, DayQueue};
use crate::models::transaction::{Transaction, TxStatus};
use crate::posting::PostingError;
use crate::reservation::ReservationError;
use crate::validator::{validate, Submission};
use thiserror::Error;
use tracing::info;

/// Failures surfaced to the caller as hard errors.
///
/// Business rejections of a submission are not here: those persist as
/// Cancelled records carrying the reason.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Posting(#[from] PostingError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    DayLedger(#[from] DayLedgerError),

    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("transaction {tx_id} is {status:?} and not eligible for this operation")]
    IneligibleStatus { tx_id: String, status: TxStatus },

    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("{function} takes {expected} arguments, got {got}")]
    BadArity {
        function: String,
        expected: usize,
        got: usize,
    },
}

/// The settlement core behind the operation surface.
///
/// # Example
/// ```
/// use bond_settlement_core_rs::{FixedClock, MemoryLedger, SettlementEngine};
///
/// let engine = SettlementEngine::new(MemoryLedger::new(), FixedClock::new("20180415070724"));
/// assert!(engine.day_queue("20180415").unwrap().is_none());
/// ```
pub struct SettlementEngine<S: LedgerStore, C: Clock> {
    store: S,
    clock: C,
}

impl<S: LedgerStore, C: Clock> SettlementEngine<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access, for seeding reference data (accounts,
    /// securities, banks, policy code).
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Submit one leg of a transfer. Always returns the persisted
    /// record, Cancelled with a reason when validation rejects it.
    #[allow(clippy::too_many_arguments)]
    pub fn security_transfer(
        &mut self,
        tx_type: &str,
        from: &str,
        to: &str,
        security_id: &str,
        security_amount: &str,
        payment: &str,
        enqueue: &str,
    ) -> Result<Transaction, SettlementError> {
        let sub = submission(tx_type, from, to, security_id, security_amount, payment, enqueue);
        self.transfer_inner(sub, None)
    }

    /// Submit corrected figures superseding an erroneous Pending
    /// record. See the correction workflow module for the supersession
    /// rules.
    #[allow(clippy::too_many_arguments)]
    pub fn security_correct_transfer(
        &mut self,
        tx_type: &str,
        from: &str,
        to: &str,
        security_id: &str,
        security_amount: &str,
        payment: &str,
        enqueue: &str,
        superseded_tx_id: &str,
    ) -> Result<Transaction, SettlementError> {
        let sub = submission(tx_type, from, to, security_id, security_amount, payment, enqueue);
        self.transfer_inner(sub, Some(&superseded_tx_id.to_uppercase()))
    }

    fn transfer_inner(
        &mut self,
        sub: Submission,
        superseded_id: Option<&str>,
    ) -> Result<Transaction, SettlementError> {
        let now = self.clock.now();
        let day = now.day_key().to_string();
        let history_key = now.history_key();
        let mut queue = get_json::<DayQueue>(&self.store, &day)?
            .unwrap_or_else(|| DayQueue::new(day.clone()));
        let mut history = get_json::<DayHistory>(&self.store, &history_key)?
            .unwrap_or_else(|| DayHistory::new(day.clone()));

        let mut tx = validate(&mut self.store, &sub, &now)?;
        let mut accepted = tx.status == TxStatus::Pending;
        let mut cancelled_by_correction: Vec<String> = Vec::new();

        if let Some(superseded_id) = superseded_id {
            tx.correction_ref = superseded_id.to_string();
            if accepted {
                let superseded: Option<Transaction> = get_json(&self.store, superseded_id)?;
                if let Some(reason) = supersession_blocker(superseded.as_ref(), superseded_id) {
                    release_reservation(&mut self.store, &tx, &now)?;
                    tx.cancel_with_memo(&reason, &now);
                    tx.error_message = reason;
                    accepted = false;
                } else {
                    cancelled_by_correction =
                        supersede(&mut self.store, &mut queue, superseded_id, &tx.tx_id, &now)?;
                }
            }
        }

        let mut counterpart_id = None;
        if accepted && tx.queued {
            let policy = SettlementPolicy::load(&self.store)?;
            match matching::run(&mut self.store, &mut tx, &mut queue, &policy, &now)? {
                MatchResult::Matched(id) | MatchResult::Mismatch(id) => counterpart_id = Some(id),
                MatchResult::NoMatch => {}
            }
        }

        put_json(&mut self.store, &tx.tx_id.clone(), &tx)?;
        if accepted && tx.queued {
            queue.insert(tx.clone())?;
        }
        history.insert(tx.clone())?;

        // Mirror in-queue updates of other records into their stored
        // form and the history.
        for id in counterpart_id.iter().chain(cancelled_by_correction.iter()) {
            if let Some(updated) = queue.get(id).cloned() {
                put_json(&mut self.store, id, &updated)?;
                if let Some(entry) = history.get_mut(id) {
                    entry.transaction = updated;
                }
            }
        }

        put_json(&mut self.store, &day, &queue)?;
        put_json(&mut self.store, &history_key, &history)?;
        info!(tx_id = %tx.tx_id, status = ?tx.status, "transfer recorded");
        Ok(tx)
    }

    /// Re-apply the payment-system outcome to a Waiting4Payment or
    /// PaymentError pair.
    pub fn submit_approve_transaction(
        &mut self,
        tx_id: &str,
        admin: &str,
    ) -> Result<Transaction, SettlementError> {
        let now = self.clock.now();
        let tx_id = tx_id.to_uppercase();
        info!(%tx_id, admin, "approval confirmation received");
        let policy = SettlementPolicy::load(&self.store)?;
        let updated = approval::submit_approve(&mut self.store, &tx_id, &policy, &now)?;
        self.mirror_day_ledgers(&updated)?;
        updated
            .into_iter()
            .next()
            .ok_or(SettlementError::TransactionNotFound(tx_id))
    }

    /// Expire a leg (and its matched counterpart) at day close.
    pub fn submit_end_day_transaction(
        &mut self,
        tx_id: &str,
        admin: &str,
    ) -> Result<Transaction, SettlementError> {
        let now = self.clock.now();
        let tx_id = tx_id.to_uppercase();
        info!(%tx_id, admin, "end-of-day expiry requested");
        let updated = endday::run(&mut self.store, &tx_id, &now)?;
        self.mirror_day_ledgers(&updated)?;
        updated
            .into_iter()
            .next()
            .ok_or(SettlementError::TransactionNotFound(tx_id))
    }

    /// String-dispatched operation surface.
    pub fn invoke(&mut self, function: &str, args: &[&str]) -> Result<Transaction, SettlementError> {
        let expect = |n: usize| -> Result<(), SettlementError> {
            if args.len() != n {
                return Err(SettlementError::BadArity {
                    function: function.to_string(),
                    expected: n,
                    got: args.len(),
                });
            }
            Ok(())
        };
        match function {
            "securityTransfer" => {
                expect(7)?;
                self.security_transfer(
                    args[0], args[1], args[2], args[3], args[4], args[5], args[6],
                )
            }
            "securityCorrectTransfer" => {
                expect(8)?;
                self.security_correct_transfer(
                    args[0], args[1], args[2], args[3], args[4], args[5], args[6], args[7],
                )
            }
            "submitApproveTransaction" => {
                expect(2)?;
                self.submit_approve_transaction(args[0], args[1])
            }
            "submitEndDayTransaction" => {
                expect(2)?;
                self.submit_end_day_transaction(args[0], args[1])
            }
            other => Err(SettlementError::UnknownFunction(other.to_string())),
        }
    }

    /// Current record of a transaction.
    pub fn transaction(&self, tx_id: &str) -> Result<Option<Transaction>, SettlementError> {
        Ok(get_json(&self.store, &tx_id.to_uppercase())?)
    }

    /// Every stored version of a transaction, oldest first.
    pub fn transaction_revisions(
        &self,
        tx_id: &str,
    ) -> Result<Vec<Transaction>, SettlementError> {
        let mut revisions = Vec::new();
        for rev in self.store.key_history(&tx_id.to_uppercase())? {
            if let Some(bytes) = rev.value {
                revisions.push(serde_json::from_slice(&bytes).map_err(LedgerError::from)?);
            }
        }
        Ok(revisions)
    }

    /// Matching queue for a `YYYYMMDD` day, `None` when nothing was
    /// submitted that day.
    pub fn day_queue(&self, day: &str) -> Result<Option<DayQueue>, SettlementError> {
        Ok(get_json(&self.store, day)?)
    }

    /// Audit history for a `YYYYMMDD` day.
    pub fn day_history(&self, day: &str) -> Result<Option<DayHistory>, SettlementError> {
        Ok(get_json(&self.store, &format!("H{day}"))?)
    }

    /// Matching queues for an inclusive day range.
    pub fn day_queues(
        &self,
        start_day: &str,
        end_day: &str,
    ) -> Result<Vec<DayQueue>, SettlementError> {
        let mut queues = Vec::new();
        for (key, bytes) in self.store.range_scan(start_day, end_day)? {
            // The scan range also covers transaction and reference-data
            // keys; day queues are exactly the 8-digit keys.
            if key.len() == 8 && key.bytes().all(|b| b.is_ascii_digit()) {
                queues.push(serde_json::from_slice(&bytes).map_err(LedgerError::from)?);
            }
        }
        Ok(queues)
    }

    /// Write updated records back into their day's queue and history
    /// entries, when present.
    fn mirror_day_ledgers(&mut self, updated: &[Transaction]) -> Result<(), SettlementError> {
        for tx in updated {
            if tx.created_at.len() < 8 {
                continue;
            }
            let day = tx.created_at[..8].to_string();
            if let Some(mut queue) = get_json::<DayQueue>(&self.store, &day)? {
                if let Some(entry) = queue.get_mut(&tx.tx_id) {
                    *entry = tx.clone();
                    put_json(&mut self.store, &day, &queue)?;
                }
            }
            let history_key = format!("H{day}");
            if let Some(mut history) = get_json::<DayHistory>(&self.store, &history_key)? {
                if let Some(entry) = history.get_mut(&tx.tx_id) {
                    entry.transaction = tx.clone();
                    put_json(&mut self.store, &history_key, &history)?;
                }
            }
        }
        Ok(())
    }
}

fn submission(
    tx_type: &str,
    from: &str,
    to: &str,
    security_id: &str,
    security_amount: &str,
    payment: &str,
    enqueue: &str,
) -> Submission {
    Submission {
        tx_type: tx_type.trim().to_uppercase(),
        from: from.trim().to_uppercase(),
        to: to.trim().to_uppercase(),
        security_id: security_id.trim().to_uppercase(),
        security_amount: security_amount.trim().to_string(),
        payment: payment.trim().to_string(),
        enqueue: enqueue.trim().to_lowercase(),
    }
}
