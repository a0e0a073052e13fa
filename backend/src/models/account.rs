//! Account aggregate
//!
//! An account holds one [`Asset`] row per security. The four balances on
//! an asset row are what settlement moves:
//!
//! - `security_amount` — face value of the security held
//! - `balance` — settled cash-equivalent balance
//! - `position` — intraday trading position, moves with `balance`
//! - `pending_balance` — reservation headroom consumed while a Sell leg
//!   waits in the matching queue

use serde::{Deserialize, Serialize};

/// Per-security holdings of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub security_id: String,
    pub security_amount: i64,
    pub balance: i64,
    pub position: i64,
    pub pending_balance: i64,
    /// Cumulative payment settled against this row, for reporting.
    pub total_payment: i64,
}

impl Asset {
    pub fn new(security_id: impl Into<String>) -> Self {
        Self {
            security_id: security_id.into(),
            security_amount: 0,
            balance: 0,
            position: 0,
            pending_balance: 0,
            total_payment: 0,
        }
    }
}

/// A settlement account, stored in the ledger under its `account_id`.
///
/// # Example
/// ```
/// use bond_settlement_core_rs::{Account, Asset};
///
/// let mut account = Account::new("004000000001", "BK004");
/// account.assets.push(Asset::new("A07103"));
/// assert!(account.asset("A07103").is_some());
/// assert!(account.asset("Z99999").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub bank_id: String,
    pub assets: Vec<Asset>,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    pub fn new(account_id: impl Into<String>, bank_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            bank_id: bank_id.into(),
            assets: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn asset(&self, security_id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.security_id == security_id)
    }

    pub fn asset_mut(&mut self, security_id: &str) -> Option<&mut Asset> {
        self.assets
            .iter_mut()
            .find(|a| a.security_id == security_id)
    }
}
