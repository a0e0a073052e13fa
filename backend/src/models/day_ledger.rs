//! Day-keyed ledgers
//!
//! Two records exist per business day:
//!
//! - [`DayQueue`], keyed by `YYYYMMDD` — the live matching queue. Only
//!   legs still eligible for matching or expiry live here; day close
//!   drains it.
//! - [`DayHistory`], keyed by `"H" + YYYYMMDD` — the append-only audit
//!   trail of every leg submitted that day, with its [`TxKind`]
//!   classification.
//!
//! Both preserve submission order: iteration yields entries first-in
//! first-out, which is the tie-break rule for matching.

use crate::models::transaction::{Transaction, TxKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DayLedgerError {
    #[error("transaction {tx_id} already recorded for day {day}")]
    DuplicateTransaction { tx_id: String, day: String },
}

/// Matching queue for one business day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayQueue {
    pub day: String,
    order: Vec<String>,
    entries: HashMap<String, Transaction>,
}

impl DayQueue {
    pub fn new(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.entries.contains_key(tx_id)
    }

    pub fn get(&self, tx_id: &str) -> Option<&Transaction> {
        self.entries.get(tx_id)
    }

    pub fn get_mut(&mut self, tx_id: &str) -> Option<&mut Transaction> {
        self.entries.get_mut(tx_id)
    }

    /// Queue a leg. The same transaction id can be queued at most once
    /// per day.
    pub fn insert(&mut self, tx: Transaction) -> Result<(), DayLedgerError> {
        if self.entries.contains_key(&tx.tx_id) {
            return Err(DayLedgerError::DuplicateTransaction {
                tx_id: tx.tx_id.clone(),
                day: self.day.clone(),
            });
        }
        self.order.push(tx.tx_id.clone());
        self.entries.insert(tx.tx_id.clone(), tx);
        Ok(())
    }

    /// Legs in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Transaction ids in submission order.
    pub fn tx_ids(&self) -> Vec<String> {
        self.order.clone()
    }
}

/// One audit entry: the leg as last written that day plus its
/// classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: TxKind,
    pub transaction: Transaction,
}

/// Audit trail for one business day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHistory {
    pub day: String,
    order: Vec<String>,
    entries: HashMap<String, HistoryEntry>,
}

impl DayHistory {
    pub fn new(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, tx_id: &str) -> Option<&HistoryEntry> {
        self.entries.get(tx_id)
    }

    pub fn get_mut(&mut self, tx_id: &str) -> Option<&mut HistoryEntry> {
        self.entries.get_mut(tx_id)
    }

    pub fn insert(&mut self, tx: Transaction) -> Result<(), DayLedgerError> {
        if self.entries.contains_key(&tx.tx_id) {
            return Err(DayLedgerError::DuplicateTransaction {
                tx_id: tx.tx_id.clone(),
                day: self.day.clone(),
            });
        }
        self.order.push(tx.tx_id.clone());
        self.entries.insert(
            tx.tx_id.clone(),
            HistoryEntry {
                kind: tx.kind(),
                transaction: tx,
            },
        );
        Ok(())
    }

    /// Entries in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::Timestamp;
    use crate::models::transaction::TxStatus;

    fn leg(id: &str) -> Transaction {
        let mut tx = Transaction::draft(&Timestamp::new("20180415070724"));
        tx.tx_id = id.to_string();
        tx.status = TxStatus::Pending;
        tx.bank_from = "BK004".to_string();
        tx.bank_to = "BK002".to_string();
        tx
    }

    #[test]
    fn test_queue_preserves_submission_order() {
        let mut queue = DayQueue::new("20180415");
        queue.insert(leg("T3")).unwrap();
        queue.insert(leg("T1")).unwrap();
        queue.insert(leg("T2")).unwrap();

        let ids: Vec<&str> = queue.iter().map(|t| t.tx_id.as_str()).collect();
        assert_eq!(ids, vec!["T3", "T1", "T2"]);
    }

    #[test]
    fn test_queue_rejects_duplicate_id() {
        let mut queue = DayQueue::new("20180415");
        queue.insert(leg("T1")).unwrap();
        let err = queue.insert(leg("T1")).unwrap_err();
        assert!(matches!(
            err,
            DayLedgerError::DuplicateTransaction { ref tx_id, .. } if tx_id == "T1"
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_get_mut_updates_in_place() {
        let mut queue = DayQueue::new("20180415");
        queue.insert(leg("T1")).unwrap();
        queue.get_mut("T1").unwrap().status = TxStatus::Matched;
        assert_eq!(queue.get("T1").unwrap().status, TxStatus::Matched);
    }

    #[test]
    fn test_history_classifies_on_insert() {
        let mut history = DayHistory::new("20180415");
        let mut tx = leg("T1");
        tx.security_amount = 102_000;
        history.insert(tx).unwrap();

        assert_eq!(history.get("T1").unwrap().kind, TxKind::CrossBankDvpOut);
    }

    #[test]
    fn test_history_rejects_duplicate_id() {
        let mut history = DayHistory::new("20180415");
        history.insert(leg("T1")).unwrap();
        assert!(history.insert(leg("T1")).is_err());
    }
}
