//! Ledger store abstraction
//!
//! The settlement core owns no storage. Every aggregate lives in an
//! external key-value ledger that supplies snapshot-isolated reads per
//! invocation and commits an invocation's writes atomically as a set.
//! The core consumes it through five primitives: `get`, `put`, `delete`,
//! `range_scan` and `key_history`.
//!
//! All stored values are JSON-serialized aggregate records; the typed
//! helpers [`get_json`] and [`put_json`] wrap the byte-level primitives.
//!
//! [`MemoryLedger`] is an in-process implementation used by tests. It
//! retains per-key revision history so `key_history` is exercisable
//! without a real backing store.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors raised by the ledger store itself.
///
/// These are fatal to the invocation and surfaced verbatim to the
/// caller; the state machine never converts them into a Cancelled
/// transaction record.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("ledger value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One historical version of a key.
///
/// `value` is `None` for a tombstone (the key was deleted at that
/// revision).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub revision: u64,
    pub value: Option<Vec<u8>>,
    pub timestamp: String,
}

/// Key-value ledger consumed by the settlement core.
///
/// Implementations must give each invocation a consistent read snapshot
/// and apply its writes atomically; conflicting concurrent write-sets
/// are rejected or serialized by the store, not by this core.
pub trait LedgerStore {
    /// Read the current value of a key, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Write (or overwrite) a key.
    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&mut self, key: &str) -> Result<(), LedgerError>;

    /// Ordered scan of current values with `start_key <= key <= end_key`.
    fn range_scan(&self, start_key: &str, end_key: &str)
        -> Result<Vec<(String, Vec<u8>)>, LedgerError>;

    /// Ordered list of past versions of a key, oldest first.
    fn key_history(&self, key: &str) -> Result<Vec<Revision>, LedgerError>;
}

/// Read and JSON-decode a record, `None` when the key is absent.
pub fn get_json<T: DeserializeOwned>(
    store: &impl LedgerStore,
    key: &str,
) -> Result<Option<T>, LedgerError> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// JSON-encode and write a record.
pub fn put_json<T: Serialize>(
    store: &mut impl LedgerStore,
    key: &str,
    value: &T,
) -> Result<(), LedgerError> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, bytes)
}

/// In-memory ledger with per-key revision history.
///
/// # Example
/// ```
/// use bond_settlement_core_rs::{LedgerStore, MemoryLedger};
///
/// let mut store = MemoryLedger::new();
/// store.put("A", b"one".to_vec()).unwrap();
/// store.put("A", b"two".to_vec()).unwrap();
/// assert_eq!(store.get("A").unwrap(), Some(b"two".to_vec()));
/// assert_eq!(store.key_history("A").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    current: BTreeMap<String, Vec<u8>>,
    history: HashMap<String, Vec<Revision>>,
    next_revision: u64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    fn record(&mut self, key: &str, value: Option<Vec<u8>>) {
        let revision = self.next_revision;
        self.next_revision += 1;
        self.history
            .entry(key.to_string())
            .or_default()
            .push(Revision {
                revision,
                value,
                timestamp: format!("rev-{revision}"),
            });
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.current.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.current.insert(key.to_string(), value.clone());
        self.record(key, Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), LedgerError> {
        if self.current.remove(key).is_some() {
            self.record(key, None);
        }
        Ok(())
    }

    fn range_scan(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        Ok(self
            .current
            .range(start_key.to_string()..=end_key.to_string())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn key_history(&self, key: &str) -> Result<Vec<Revision>, LedgerError> {
        Ok(self.history.get(key).cloned().unwrap_or_default())
    }
}
