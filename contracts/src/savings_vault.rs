//! # Savings Vault Contract
//!
//! One savings goal per address. The vault has no id of its own; goals are
//! keyed by owner.
//!
//! 1. **Create**: owner sets a target and a lock window (7–365 days).
//! 2. **Deposit**: owner adds funds while the goal is active.
//! 3. **Close**: after `lock_end` the owner closes the goal, which frees
//!    the address for a new one.
//!
//! A second `createGoal` while a goal is active reverts with
//! `GoalAlreadyActive`; it never overwrites the running goal.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use savings_orchestrator::config::{
    MAX_LOCK_DAYS, MIN_LOCK_DAYS, SECONDS_PER_DAY, VAULT_MAX_TARGET, VAULT_MIN_TARGET,
};
use savings_orchestrator::ledger::{Address, TokenAmount, VaultRecord};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The owner already has a running goal.
    #[error("address {0} already has an active goal")]
    GoalAlreadyActive(Address),

    /// The owner has no running goal.
    #[error("address {0} has no active goal")]
    NoActiveGoal(Address),

    /// Target outside the accepted range.
    #[error("target {0} outside the accepted range")]
    InvalidTarget(TokenAmount),

    /// Lock window outside 7–365 days.
    #[error("lock duration of {0}s outside the accepted range")]
    InvalidLockDuration(u64),

    /// The goal cannot be closed before its lock window ends.
    #[error("goal is locked until {0}")]
    StillLocked(DateTime<Utc>),

    /// The deposit would overflow the goal's balance.
    #[error("amount overflow")]
    Overflow,
}

impl VaultError {
    /// The custom error name the deployed vault reverts with.
    pub fn revert_reason(&self) -> &'static str {
        match self {
            VaultError::GoalAlreadyActive(_) => "GoalAlreadyActive",
            VaultError::NoActiveGoal(_) => "NoActiveGoal",
            VaultError::InvalidTarget(_) => "InvalidTarget",
            VaultError::InvalidLockDuration(_) => "InvalidLockDuration",
            VaultError::StillLocked(_) => "StillLocked",
            VaultError::Overflow => "Panic(0x11)",
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// All goals, keyed by owner.
#[derive(Debug, Clone, Default)]
pub struct SavingsVault {
    goals: HashMap<Address, VaultRecord>,
}

impl SavingsVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while `owner`'s goal accepts deposits.
    pub fn has_goal(&self, owner: Address) -> bool {
        self.goals.get(&owner).map_or(false, |goal| goal.is_active)
    }

    /// `owner`'s goal, active or closed.
    pub fn goal(&self, owner: Address) -> Option<&VaultRecord> {
        self.goals.get(&owner)
    }

    /// Opens a goal for `owner`.
    ///
    /// # Errors
    ///
    /// [`VaultError::GoalAlreadyActive`] if one is running; range errors
    /// for the target and lock window.
    pub fn create_goal(
        &mut self,
        owner: Address,
        target_amount: TokenAmount,
        lock_duration_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<VaultRecord, VaultError> {
        if self.has_goal(owner) {
            return Err(VaultError::GoalAlreadyActive(owner));
        }
        if target_amount < VAULT_MIN_TARGET || target_amount > VAULT_MAX_TARGET {
            return Err(VaultError::InvalidTarget(target_amount));
        }
        let lock_range = MIN_LOCK_DAYS * SECONDS_PER_DAY..=MAX_LOCK_DAYS * SECONDS_PER_DAY;
        if !lock_range.contains(&lock_duration_secs) {
            return Err(VaultError::InvalidLockDuration(lock_duration_secs));
        }

        let record = VaultRecord {
            owner,
            target_amount,
            current_amount: TokenAmount::ZERO,
            lock_start: now,
            lock_end: now + Duration::seconds(lock_duration_secs as i64),
            is_completed: false,
            is_active: true,
        };
        self.goals.insert(owner, record.clone());
        Ok(record)
    }

    /// Adds `amount` to `owner`'s running goal. The caller moves the funds.
    pub fn record_deposit(
        &mut self,
        owner: Address,
        amount: TokenAmount,
    ) -> Result<TokenAmount, VaultError> {
        let goal = self
            .goals
            .get_mut(&owner)
            .filter(|goal| goal.is_active)
            .ok_or(VaultError::NoActiveGoal(owner))?;
        goal.current_amount = goal
            .current_amount
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        Ok(goal.current_amount)
    }

    /// Closes `owner`'s goal once its lock window has ended.
    pub fn close_goal(
        &mut self,
        owner: Address,
        now: DateTime<Utc>,
    ) -> Result<TokenAmount, VaultError> {
        let goal = self
            .goals
            .get_mut(&owner)
            .filter(|goal| goal.is_active)
            .ok_or(VaultError::NoActiveGoal(owner))?;
        if now < goal.lock_end {
            return Err(VaultError::StillLocked(goal.lock_end));
        }
        goal.is_active = false;
        goal.is_completed = goal.current_amount >= goal.target_amount;
        Ok(goal.current_amount)
    }
}
