//! Bank aggregate
//!
//! Custodian-bank rollups mirrored from cross-bank settlement. Each
//! [`BankTotal`] row accumulates the net cash (`total_balance`) and face
//! value (`total_amount`) moved for one security. In-bank transfers
//! never touch these rollups.

use serde::{Deserialize, Serialize};

/// Per-security settlement rollup of a bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTotal {
    pub security_id: String,
    pub total_balance: i64,
    pub total_amount: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A custodian bank, stored in the ledger under its `bank_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub bank_id: String,
    pub bank_name: String,
    pub bank_totals: Vec<BankTotal>,
    /// Accounts seen settling through this bank.
    pub accounts: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Bank {
    pub fn new(bank_id: impl Into<String>) -> Self {
        Self {
            bank_id: bank_id.into(),
            bank_name: String::new(),
            bank_totals: Vec::new(),
            accounts: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn total(&self, security_id: &str) -> Option<&BankTotal> {
        self.bank_totals
            .iter()
            .find(|t| t.security_id == security_id)
    }

    /// Add (or subtract, when `negative`) a settled movement to the
    /// rollup row for `security_id`, creating the row on first use, and
    /// register the settling account.
    pub fn apply_total(
        &mut self,
        security_id: &str,
        balance: i64,
        amount: i64,
        negative: bool,
        account_id: &str,
        now: &str,
    ) {
        let sign: i64 = if negative { -1 } else { 1 };
        let row = match self
            .bank_totals
            .iter()
            .position(|t| t.security_id == security_id)
        {
            Some(idx) => &mut self.bank_totals[idx],
            None => {
                self.bank_totals.push(BankTotal {
                    security_id: security_id.to_string(),
                    total_balance: 0,
                    total_amount: 0,
                    created_at: now.to_string(),
                    updated_at: now.to_string(),
                });
                let last = self.bank_totals.len() - 1;
                &mut self.bank_totals[last]
            }
        };
        row.total_balance += sign * balance;
        row.total_amount += sign * amount;
        row.updated_at = now.to_string();

        if !self.accounts.iter().any(|a| a == account_id) {
            self.accounts.push(account_id.to_string());
        }
        self.updated_at = now.to_string();
    }
}
