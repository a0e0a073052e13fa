//! Pending-balance reservation
//!
//! A Sell submission commits cash before any counter-leg exists. To stop
//! two concurrent submissions from spending the same balance, validation
//! transfers the payment from the sender's `pending_balance` to the
//! receiver's before the leg is ever marked Pending. The transfer is
//! conservative: the sum of both pending balances never changes.
//!
//! [`release`] is the exact inverse and runs whenever a reserved leg is
//! cancelled (validation failure downstream, end-of-day expiry, or
//! correction).

use crate::core::time::Timestamp;
use crate::ledger::{get_json, put_json, LedgerError, LedgerStore};
use crate::models::account::Account;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("account {account_id} has no asset entry for security {security_id}")]
    AssetNotFound {
        account_id: String,
        security_id: String,
    },

    #[error("pending balance exhausted on account {account_id}: {pending_balance}")]
    Exhausted {
        account_id: String,
        pending_balance: i64,
    },
}

fn shift_pending(
    store: &mut impl LedgerStore,
    account_id: &str,
    security_id: &str,
    delta: i64,
    now: &Timestamp,
) -> Result<i64, ReservationError> {
    let mut account: Account = get_json(store, account_id)?
        .ok_or_else(|| ReservationError::AccountNotFound(account_id.to_string()))?;
    let asset = account
        .asset_mut(security_id)
        .ok_or_else(|| ReservationError::AssetNotFound {
            account_id: account_id.to_string(),
            security_id: security_id.to_string(),
        })?;
    asset.pending_balance += delta;
    let remaining = asset.pending_balance;
    account.updated_at = now.as_str().to_string();
    put_json(store, account_id, &account)?;
    Ok(remaining)
}

/// Move `payment` of pending balance from `sender` to `receiver`.
///
/// Both accounts must carry an asset entry for the security, and both
/// must be left with a strictly positive pending balance. On the
/// exhaustion failure the sender's write is undone before returning, so
/// a failed reservation leaves no trace.
pub fn reserve(
    store: &mut impl LedgerStore,
    security_id: &str,
    payment: i64,
    sender: &str,
    receiver: &str,
    now: &Timestamp,
) -> Result<(), ReservationError> {
    let sender_pending = shift_pending(store, sender, security_id, -payment, now)?;
    if sender_pending <= 0 {
        shift_pending(store, sender, security_id, payment, now)?;
        return Err(ReservationError::Exhausted {
            account_id: sender.to_string(),
            pending_balance: sender_pending,
        });
    }
    let receiver_pending = shift_pending(store, receiver, security_id, payment, now);
    let receiver_pending = match receiver_pending {
        Ok(p) => p,
        Err(e) => {
            shift_pending(store, sender, security_id, payment, now)?;
            return Err(e);
        }
    };
    if receiver_pending <= 0 {
        shift_pending(store, sender, security_id, payment, now)?;
        shift_pending(store, receiver, security_id, -payment, now)?;
        return Err(ReservationError::Exhausted {
            account_id: receiver.to_string(),
            pending_balance: receiver_pending,
        });
    }
    Ok(())
}

/// Exact inverse of [`reserve`]: hand the reserved payment back from
/// `receiver` to `sender`.
pub fn release(
    store: &mut impl LedgerStore,
    security_id: &str,
    payment: i64,
    sender: &str,
    receiver: &str,
    now: &Timestamp,
) -> Result<(), ReservationError> {
    shift_pending(store, receiver, security_id, -payment, now)?;
    shift_pending(store, sender, security_id, payment, now)?;
    Ok(())
}
