//! Transaction model
//!
//! One leg of a delivery-versus-payment transfer. A transfer settles
//! only after a Sell leg and a Buy leg describing the same trade are
//! both submitted and matched by fingerprint.
//!
//! Lifecycle:
//!
//! ```text
//! Pending ──match──▶ Matched ──policy──▶ Finished
//!    │                   │                  ▲
//!    │                   ├─▶ Waiting4Payment┤
//!    │                   │        │         │
//!    │                   │        ▼         │
//!    │                   └─▶ PaymentError ──┘ (approval)
//!    │                            │
//!    └──────── end of day ────────┴──▶ Cancelled
//! ```
//!
//! Finished and Cancelled are terminal: the record is never mutated
//! again; a correction supersedes it with a brand-new record instead.

use crate::core::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Side of a transfer leg. Serialized as the single letter the
/// submission surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    #[serde(rename = "S")]
    Sell,
    #[serde(rename = "B")]
    Buy,
}

impl TxType {
    /// Parse the first letter of a raw submission field, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('S') => Some(TxType::Sell),
            Some('B') => Some(TxType::Buy),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            TxType::Sell => 'S',
            TxType::Buy => 'B',
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            TxType::Sell => TxType::Buy,
            TxType::Buy => TxType::Sell,
        }
    }
}

/// Settlement status of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Validated and queued, no counter-leg found yet.
    Pending,
    /// Counter-leg found and linked; postings applied.
    Matched,
    /// Matched cross-bank DVP leg awaiting external cash confirmation.
    Waiting4Payment,
    /// External payment system reported a cash shortfall.
    PaymentError,
    /// Settled. Terminal.
    Finished,
    /// Rejected, expired, superseded or cancelled by policy. Terminal.
    Cancelled,
}

impl TxStatus {
    /// Terminal records must not be mutated again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Finished | TxStatus::Cancelled)
    }

    /// Statuses that indicate postings have been applied and must be
    /// reversed if the leg is cancelled later.
    pub fn has_postings(&self) -> bool {
        matches!(
            self,
            TxStatus::Matched | TxStatus::Waiting4Payment | TxStatus::PaymentError
        )
    }
}

/// Audit classification of a leg for the day history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    InBankFopOut,
    InBankFopIn,
    InBankDvpOut,
    InBankDvpIn,
    CrossBankFopOut,
    CrossBankFopIn,
    CrossBankDvpOut,
    CrossBankDvpIn,
}

impl TxKind {
    /// Classify a leg: scope by bank pair, style by whether a face-value
    /// quantity moves (FOP when `security_amount == 0`), direction by side.
    pub fn classify(bank_from: &str, bank_to: &str, security_amount: i64, tx_type: TxType) -> Self {
        let cross = bank_from != bank_to;
        let fop = security_amount == 0;
        let out = tx_type == TxType::Sell;
        match (cross, fop, out) {
            (false, true, true) => TxKind::InBankFopOut,
            (false, true, false) => TxKind::InBankFopIn,
            (false, false, true) => TxKind::InBankDvpOut,
            (false, false, false) => TxKind::InBankDvpIn,
            (true, true, true) => TxKind::CrossBankFopOut,
            (true, true, false) => TxKind::CrossBankFopIn,
            (true, false, true) => TxKind::CrossBankDvpOut,
            (true, false, false) => TxKind::CrossBankDvpIn,
        }
    }
}

/// One leg of a DVP transfer, as stored in the ledger under its `tx_id`.
///
/// `payment` is the settlement cash amount and `security_amount` the
/// face-value quantity moved; both are non-negative i64. The `from_*`
/// fields snapshot the from-account's asset row at validation time for
/// the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// `bank_from + type letter + from + YYYYMMDDHHMMSS`
    pub tx_id: String,
    pub tx_type: TxType,
    /// Submitting account.
    pub from: String,
    /// Counterparty account.
    pub to: String,
    /// Derived bank prefix of `from` (`"BK"` + first three digits).
    pub bank_from: String,
    pub bank_to: String,
    pub security_id: String,
    pub security_amount: i64,
    pub payment: i64,
    pub status: TxStatus,
    /// True once settlement postings have been applied for this leg.
    pub is_frozen: bool,
    /// Fingerprint over all trade fields; equal on exact counter-legs.
    pub full_index: String,
    /// Fingerprint without amount/payment; equal on mistyped counter-legs.
    pub short_index: String,
    /// Correction link: the superseded record points at its replacement
    /// and the replacement points back.
    pub correction_ref: String,
    pub matched_tx_id: String,
    /// Whether the submission asked to enter the matching queue.
    pub queued: bool,
    // From-account asset snapshot at validation time.
    pub from_balance: i64,
    pub from_position: i64,
    pub from_security_amount: i64,
    pub from_pending_balance: i64,
    pub memo: String,
    pub error_message: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Transaction {
    /// Memo applied when the external payment system reports a shortfall.
    pub const MEMO_PAYMENT_SHORTFALL: &'static str = "payment shortfall at clearing";
    /// Memo applied on plain cancellation.
    pub const MEMO_CANCELLED: &'static str = "transaction cancelled";
    /// Memo on a Pending leg expired at day close.
    pub const MEMO_ENDDAY_UNMATCHED: &'static str = "unmatched at end of day";
    /// Memo on a matched-but-unsettled leg expired at day close.
    pub const MEMO_ENDDAY_PAYMENT: &'static str = "payment system error at end of day";
    /// Memo on a record superseded by a correction.
    pub const MEMO_CORRECTED: &'static str = "superseded by correction";

    /// Skeleton record stamped at submission time. Starts Cancelled so a
    /// validation failure persists as-is; the validator flips it to
    /// Pending only after every precondition passes.
    pub fn draft(now: &Timestamp) -> Self {
        Self {
            tx_id: String::new(),
            tx_type: TxType::Sell,
            from: String::new(),
            to: String::new(),
            bank_from: String::new(),
            bank_to: String::new(),
            security_id: String::new(),
            security_amount: 0,
            payment: 0,
            status: TxStatus::Cancelled,
            is_frozen: false,
            full_index: String::new(),
            short_index: String::new(),
            correction_ref: String::new(),
            matched_tx_id: String::new(),
            queued: false,
            from_balance: 0,
            from_position: 0,
            from_security_amount: 0,
            from_pending_balance: 0,
            memo: "awaiting match".to_string(),
            error_message: String::new(),
            created_at: now.as_str().to_string(),
            updated_at: now.as_str().to_string(),
        }
    }

    /// FOP legs move securities with no cash.
    pub fn is_fop(&self) -> bool {
        self.security_amount == 0
    }

    pub fn is_cross_bank(&self) -> bool {
        self.bank_from != self.bank_to
    }

    /// The account that gives up cash-equivalent balance: the `from`
    /// side of a Sell leg, the `to` side of a Buy leg.
    pub fn sell_side_account(&self) -> &str {
        match self.tx_type {
            TxType::Sell => &self.from,
            TxType::Buy => &self.to,
        }
    }

    /// The account the balance moves to; mirror of [`sell_side_account`].
    ///
    /// [`sell_side_account`]: Transaction::sell_side_account
    pub fn buy_side_account(&self) -> &str {
        match self.tx_type {
            TxType::Sell => &self.to,
            TxType::Buy => &self.from,
        }
    }

    pub fn kind(&self) -> TxKind {
        TxKind::classify(
            &self.bank_from,
            &self.bank_to,
            self.security_amount,
            self.tx_type,
        )
    }

    /// Apply a status transition with the memo and freeze conventions
    /// shared by every workflow:
    ///
    /// - PaymentError and Cancelled carry their standard memo and thaw
    ///   the record (its postings are gone or about to be reversed)
    /// - Matched clears the memo; Finished clears memo and error
    /// - everything else freezes the record
    pub fn apply_status(&mut self, status: TxStatus, matched_tx_id: Option<&str>, now: &Timestamp) {
        self.status = status;
        match status {
            TxStatus::PaymentError => {
                self.memo = Self::MEMO_PAYMENT_SHORTFALL.to_string();
            }
            TxStatus::Cancelled => {
                self.memo = Self::MEMO_CANCELLED.to_string();
            }
            TxStatus::Matched => {
                self.memo.clear();
            }
            TxStatus::Finished => {
                self.memo.clear();
                self.error_message.clear();
            }
            TxStatus::Pending | TxStatus::Waiting4Payment => {}
        }
        self.is_frozen = !matches!(status, TxStatus::Cancelled | TxStatus::PaymentError);
        if let Some(id) = matched_tx_id {
            self.matched_tx_id = id.to_string();
        }
        self.updated_at = now.as_str().to_string();
    }

    /// Cancel with an explicit memo, leaving `matched_tx_id` untouched.
    /// Used by end-of-day expiry and corrections, where the memo states
    /// the cause instead of the generic cancellation text.
    pub fn cancel_with_memo(&mut self, memo: &str, now: &Timestamp) {
        self.status = TxStatus::Cancelled;
        self.memo = memo.to_string();
        self.is_frozen = false;
        self.updated_at = now.as_str().to_string();
    }
}
