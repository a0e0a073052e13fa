//! Bond Settlement Core - Rust Engine
//!
//! Delivery-versus-payment settlement engine for book-entry government bonds.
//! Sell and buy legs are submitted independently, matched by deterministic
//! fingerprints, and settled by posting balance, security-ownership and bank
//! rollup deltas against a pluggable ledger store.
//!
//! # Architecture
//!
//! - **core**: Timestamps and clock injection
//! - **ledger**: Store trait consumed by the engine (get/put/delete/range/history)
//! - **models**: Domain aggregates (Transaction, Account, Security, Bank, day ledgers)
//! - **fingerprint**: Full/short transaction indexes used for counter-leg lookup
//! - **validator**: Submission validation and pending-balance reservation
//! - **matching**: Same-day counter-leg scan and settlement trigger
//! - **posting**: Balance/security/bank posting and its exact reversal
//! - **approval**: Payment-system outcome policy and explicit approval
//! - **endday**: End-of-day expiry of unmatched or unsettled legs
//! - **correction**: Supersede-and-resubmit workflow
//! - **engine**: Operation surface and string-dispatched invocation
//!
//! # Critical Invariants
//!
//! 1. All money and face values are i64
//! 2. Postings net to zero across sender and receiver
//! 3. Terminal transactions (Finished, Cancelled) are never mutated again
//! 4. The engine holds no state between invocations; every operation
//!    re-reads its aggregates and writes them back

// Module declarations
pub mod approval;
pub mod core;
pub mod correction;
pub mod endday;
pub mod engine;
pub mod fingerprint;
pub mod ledger;
pub mod matching;
pub mod models;
pub mod posting;
pub mod reservation;
pub mod validator;

// Re-exports for convenience
pub use approval::SettlementPolicy;
pub use crate::core::time::{Clock, FixedClock, SystemClock, Timestamp};
pub use engine::{SettlementEngine, SettlementError};
pub use fingerprint::Fingerprints;
pub use ledger::{LedgerError, LedgerStore, MemoryLedger, Revision};
pub use models::{
    account::{Account, Asset},
    bank::{Bank, BankTotal},
    day_ledger::{DayHistory, DayLedgerError, DayQueue, HistoryEntry},
    security::{Owner, Security, SecurityTotal},
    transaction::{Transaction, TxKind, TxStatus, TxType},
};
pub use posting::{post_transfer, PostingError, PostingOutcome};
