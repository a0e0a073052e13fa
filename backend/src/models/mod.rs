//! Domain aggregates for the settlement core
//!
//! All records here are ledger-owned: the engine reads them at the start
//! of an invocation and writes them back at the end. Nothing is cached
//! between invocations.

pub mod account;
pub mod bank;
pub mod day_ledger;
pub mod security;
pub mod transaction;

// Re-exports
pub use account::{Account, Asset};
pub use bank::{Bank, BankTotal};
pub use day_ledger::{DayHistory, DayLedgerError, DayQueue, HistoryEntry};
pub use security::{Owner, Security, SecurityTotal};
pub use transaction::{Transaction, TxKind, TxStatus, TxType};
