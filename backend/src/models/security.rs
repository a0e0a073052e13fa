//! Security aggregate
//!
//! The issuer-side registry of one bond: who owns how much
//! (`owners`), and how much sits at each custodian bank
//! (`security_totals`). Settlement keeps both in step with the
//! account-side asset rows.

use serde::{Deserialize, Serialize};

/// Registered holder of a security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub account_id: String,
    pub bank_id: String,
    /// Face value registered to this holder.
    pub owned_amount: i64,
    /// Cash-equivalent balance registered to this holder.
    pub owned_balance: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-bank custody rollup of a security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityTotal {
    pub bank_id: String,
    pub total_balance: i64,
    pub total_amount: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A bond issue, stored in the ledger under its `security_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub security_id: String,
    pub security_name: String,
    /// Total face value issued.
    pub total_amount: i64,
    pub owners: Vec<Owner>,
    pub security_totals: Vec<SecurityTotal>,
    pub created_at: String,
    pub updated_at: String,
}

impl Security {
    pub fn new(security_id: impl Into<String>) -> Self {
        Self {
            security_id: security_id.into(),
            security_name: String::new(),
            total_amount: 0,
            owners: Vec::new(),
            security_totals: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn owner_mut(&mut self, account_id: &str) -> Option<&mut Owner> {
        self.owners
            .iter_mut()
            .find(|o| o.account_id == account_id)
    }

    pub fn owner(&self, account_id: &str) -> Option<&Owner> {
        self.owners.iter().find(|o| o.account_id == account_id)
    }

    /// Custody rollup row for a bank, created on first use.
    pub fn total_for_bank_mut(&mut self, bank_id: &str, now: &str) -> &mut SecurityTotal {
        if let Some(idx) = self
            .security_totals
            .iter()
            .position(|t| t.bank_id == bank_id)
        {
            return &mut self.security_totals[idx];
        }
        self.security_totals.push(SecurityTotal {
            bank_id: bank_id.to_string(),
            total_balance: 0,
            total_amount: 0,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        });
        let last = self.security_totals.len() - 1;
        &mut self.security_totals[last]
    }
}
