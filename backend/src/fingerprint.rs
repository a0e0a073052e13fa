//! Match fingerprints
//!
//! Each leg carries two SHA-256 fingerprints computed at validation
//! time. Fields are folded in seller-first canonical order, so a Sell
//! leg and the Buy leg describing the same trade produce identical
//! digests no matter which side submitted first.
//!
//! - `full_index` covers every trade field; equality means the legs
//!   describe exactly the same transfer and may settle.
//! - `short_index` drops the face value and the payment; equality with
//!   a differing `full_index` flags a likely mistyped counterpart.

use crate::models::transaction::TxType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprints {
    pub full_index: String,
    pub short_index: String,
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

/// Compute both fingerprints for one leg.
///
/// The seller's account and bank always fold in first: a Sell leg uses
/// its own `(from, bank_from)` pair there, a Buy leg its counterparty's
/// `(to, bank_to)` pair.
///
/// # Example
/// ```
/// use bond_settlement_core_rs::fingerprint::fingerprints;
/// use bond_settlement_core_rs::TxType;
///
/// let sell = fingerprints(
///     TxType::Sell,
///     "004000000001", "002000000001",
///     "BK004", "BK002",
///     "A07103", 102_000, 100_000,
/// );
/// let buy = fingerprints(
///     TxType::Buy,
///     "002000000001", "004000000001",
///     "BK002", "BK004",
///     "A07103", 102_000, 100_000,
/// );
/// assert_eq!(sell.full_index, buy.full_index);
/// assert_eq!(sell.short_index, buy.short_index);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn fingerprints(
    tx_type: TxType,
    from: &str,
    to: &str,
    bank_from: &str,
    bank_to: &str,
    security_id: &str,
    security_amount: i64,
    payment: i64,
) -> Fingerprints {
    let (sell_account, buy_account, sell_bank, buy_bank) = match tx_type {
        TxType::Sell => (from, to, bank_from, bank_to),
        TxType::Buy => (to, from, bank_to, bank_from),
    };
    let amount = security_amount.to_string();
    let payment = payment.to_string();

    Fingerprints {
        full_index: digest(&[
            security_id,
            sell_account,
            buy_account,
            sell_bank,
            buy_bank,
            &amount,
            &payment,
        ]),
        short_index: digest(&[security_id, sell_account, buy_account, sell_bank, buy_bank]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sell() -> Fingerprints {
        fingerprints(
            TxType::Sell,
            "004000000001",
            "002000000001",
            "BK004",
            "BK002",
            "A07103",
            102_000,
            100_000,
        )
    }

    #[test]
    fn test_opposite_legs_share_both_fingerprints() {
        let buy = fingerprints(
            TxType::Buy,
            "002000000001",
            "004000000001",
            "BK002",
            "BK004",
            "A07103",
            102_000,
            100_000,
        );
        assert_eq!(sell(), buy);
    }

    #[test]
    fn test_amount_mismatch_changes_only_full_index() {
        let buy = fingerprints(
            TxType::Buy,
            "002000000001",
            "004000000001",
            "BK002",
            "BK004",
            "A07103",
            103_000,
            100_000,
        );
        assert_ne!(sell().full_index, buy.full_index);
        assert_eq!(sell().short_index, buy.short_index);
    }

    #[test]
    fn test_payment_mismatch_changes_only_full_index() {
        let buy = fingerprints(
            TxType::Buy,
            "002000000001",
            "004000000001",
            "BK002",
            "BK004",
            "A07103",
            102_000,
            99_000,
        );
        assert_ne!(sell().full_index, buy.full_index);
        assert_eq!(sell().short_index, buy.short_index);
    }

    #[test]
    fn test_security_mismatch_changes_both() {
        let buy = fingerprints(
            TxType::Buy,
            "002000000001",
            "004000000001",
            "BK002",
            "BK004",
            "B06105",
            102_000,
            100_000,
        );
        assert_ne!(sell().full_index, buy.full_index);
        assert_ne!(sell().short_index, buy.short_index);
    }

    #[test]
    fn test_field_boundaries_are_delimited() {
        // "A0" + "7103..." must not collide with "A07" + "103...".
        let a = digest(&["A0", "7103"]);
        let b = digest(&["A07", "103"]);
        assert_ne!(a, b);
    }
}
