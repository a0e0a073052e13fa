//! Ledger time
//!
//! Every settlement operation stamps the records it touches with a
//! 14-digit `YYYYMMDDHHMMSS` timestamp and partitions its working set by
//! the 8-digit calendar day prefix. The clock is injected so tests can
//! pin the day and drive matching deterministically.

use serde::{Deserialize, Serialize};

/// A 14-digit `YYYYMMDDHHMMSS` ledger timestamp.
///
/// The first 8 digits form the day key that scopes the matching queue
/// and the audit history.
///
/// # Example
/// ```
/// use bond_settlement_core_rs::Timestamp;
///
/// let ts = Timestamp::new("20180415070724");
/// assert_eq!(ts.day_key(), "20180415");
/// assert_eq!(ts.as_str(), "20180415070724");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(String);

impl Timestamp {
    /// Create a timestamp from a 14-digit string.
    ///
    /// # Panics
    /// Panics if the string is not exactly 14 ASCII digits.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        assert!(
            raw.len() == 14 && raw.bytes().all(|b| b.is_ascii_digit()),
            "timestamp must be 14 digits, got {:?}",
            raw
        );
        Self(raw)
    }

    /// Full 14-digit timestamp.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 8-digit `YYYYMMDD` day key.
    pub fn day_key(&self) -> &str {
        &self.0[..8]
    }

    /// History key for the same day (`"H" + YYYYMMDD`).
    pub fn history_key(&self) -> String {
        format!("H{}", self.day_key())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of ledger timestamps.
///
/// Production uses [`SystemClock`]; tests use [`FixedClock`] to keep
/// all submissions on one business day.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time formatted as a ledger timestamp (UTC).
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(chrono::Utc::now().format("%Y%m%d%H%M%S").to_string())
    }
}

/// Fixed, manually advanced clock for tests.
///
/// # Example
/// ```
/// use bond_settlement_core_rs::{Clock, FixedClock};
///
/// let mut clock = FixedClock::new("20180415070724");
/// assert_eq!(clock.now().day_key(), "20180415");
/// clock.set("20180415070801");
/// assert_eq!(clock.now().as_str(), "20180415070801");
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    current: Timestamp,
}

impl FixedClock {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            current: Timestamp::new(raw),
        }
    }

    /// Move the clock to a new timestamp.
    pub fn set(&mut self, raw: impl Into<String>) {
        self.current = Timestamp::new(raw);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.current.clone()
    }
}
