//! Local parameter checks.
//!
//! Pure functions: no ledger access, the current time passed in. A request
//! that fails here never reaches the network.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{
    MAX_LOCK_DAYS, MIN_LOCK_DAYS, POOL_MAX_MEMBERS, POOL_MAX_TARGET, POOL_MIN_MEMBERS,
    POOL_MIN_TARGET, SECONDS_PER_DAY, VAULT_MAX_TARGET, VAULT_MIN_TARGET,
};
use crate::error::ErrorKind;
use crate::ledger::TokenAmount;

/// Validated vault creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalParams {
    /// Savings target.
    pub target_amount: TokenAmount,
    /// Lock window length passed to `createGoal`.
    pub lock_duration_secs: u64,
}

/// Lock window from `now` to `deadline`, in seconds, if it lies within
/// [`MIN_LOCK_DAYS`, `MAX_LOCK_DAYS`] inclusive.
pub fn lock_duration(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64, ErrorKind> {
    let secs = (deadline - now).num_seconds();
    let min = (MIN_LOCK_DAYS * SECONDS_PER_DAY) as i64;
    let max = (MAX_LOCK_DAYS * SECONDS_PER_DAY) as i64;
    if secs < min || secs > max {
        return Err(ErrorKind::InvalidParameters(format!(
            "lock duration must be between {} and {} days, got {:.2} days",
            MIN_LOCK_DAYS,
            MAX_LOCK_DAYS,
            secs as f64 / SECONDS_PER_DAY as f64
        )));
    }
    Ok(secs as u64)
}

fn check_range(
    what: &str,
    amount: TokenAmount,
    min: TokenAmount,
    max: TokenAmount,
) -> Result<(), ErrorKind> {
    if amount < min || amount > max {
        return Err(ErrorKind::InvalidParameters(format!(
            "{} must be between {} and {}, got {}",
            what, min, max, amount
        )));
    }
    Ok(())
}

/// Checks `createGoal` arguments.
pub fn validate_goal(
    target_amount: TokenAmount,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<GoalParams, ErrorKind> {
    let lock_duration_secs = lock_duration(deadline, now)?;
    check_range("vault target", target_amount, VAULT_MIN_TARGET, VAULT_MAX_TARGET)?;
    Ok(GoalParams {
        target_amount,
        lock_duration_secs,
    })
}

/// Checks `createPool` arguments and returns the lock duration.
pub fn validate_pool(
    name: &str,
    target_amount: TokenAmount,
    max_members: u32,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u64, ErrorKind> {
    if name.trim().is_empty() {
        return Err(ErrorKind::InvalidParameters("pool name must not be empty".into()));
    }
    let lock_duration_secs = lock_duration(deadline, now)?;
    check_range("pool target", target_amount, POOL_MIN_TARGET, POOL_MAX_TARGET)?;
    if !(POOL_MIN_MEMBERS..=POOL_MAX_MEMBERS).contains(&max_members) {
        return Err(ErrorKind::InvalidParameters(format!(
            "max members must be between {} and {}, got {}",
            POOL_MIN_MEMBERS, POOL_MAX_MEMBERS, max_members
        )));
    }
    Ok(lock_duration_secs)
}

/// Rejects zero-value transfers.
pub fn validate_transfer(amount: TokenAmount) -> Result<(), ErrorKind> {
    if amount.is_zero() {
        return Err(ErrorKind::InvalidParameters(
            "amount must be greater than zero".into(),
        ));
    }
    Ok(())
}
