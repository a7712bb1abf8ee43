//! # Group Pool Contract
//!
//! Multi-member savings pools with a capacity and a lock window.
//!
//! - `createPool` assigns the next sequential id and announces it only
//!   through the `PoolCreated` event.
//! - `joinPool` registers membership and takes the first contribution in
//!   one step. It fails with `PoolFull` at capacity and `AlreadyMember` for
//!   an existing member.
//! - `contributeToPool` is for members only (`NotMember` otherwise).
//!
//! `current_member_count` never exceeds `max_members`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use savings_orchestrator::config::{
    MAX_LOCK_DAYS, MIN_LOCK_DAYS, POOL_MAX_MEMBERS, POOL_MAX_TARGET, POOL_MIN_MEMBERS,
    POOL_MIN_TARGET, SECONDS_PER_DAY,
};
use savings_orchestrator::ledger::{
    Address, CreatePoolCall, PoolId, PoolMember, PoolRecord, TokenAmount,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by pool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool {0} does not exist")]
    PoolNotFound(PoolId),

    #[error("pool {0} is full")]
    PoolFull(PoolId),

    #[error("{address} is already a member of pool {pool_id}")]
    AlreadyMember { pool_id: PoolId, address: Address },

    #[error("{address} is not a member of pool {pool_id}")]
    NotMember { pool_id: PoolId, address: Address },

    #[error("pool {0} no longer accepts contributions")]
    PoolInactive(PoolId),

    #[error("invalid pool parameters: {0}")]
    InvalidParameters(String),

    #[error("amount overflow")]
    Overflow,
}

impl PoolError {
    /// The custom error name the deployed pool reverts with.
    pub fn revert_reason(&self) -> &'static str {
        match self {
            PoolError::PoolNotFound(_) => "PoolNotFound",
            PoolError::PoolFull(_) => "PoolFull",
            PoolError::AlreadyMember { .. } => "AlreadyMember",
            PoolError::NotMember { .. } => "NotMember",
            PoolError::PoolInactive(_) => "PoolInactive",
            PoolError::InvalidParameters(_) => "InvalidPoolParameters",
            PoolError::Overflow => "Panic(0x11)",
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A referral recorded when a member joined through someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub pool_id: PoolId,
    pub member: Address,
    pub referrer: Address,
    pub joined_at: DateTime<Utc>,
}

/// Every pool with its members, in join order.
#[derive(Debug, Clone)]
pub struct GroupPool {
    pools: BTreeMap<PoolId, PoolRecord>,
    members: HashMap<PoolId, Vec<PoolMember>>,
    referrals: Vec<Referral>,
    next_id: u64,
}

impl Default for GroupPool {
    fn default() -> Self {
        Self {
            pools: BTreeMap::new(),
            members: HashMap::new(),
            referrals: Vec::new(),
            next_id: 1,
        }
    }
}

impl GroupPool {
    /// No pools; the first one created gets id 1.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self, pool_id: PoolId) -> Option<&PoolRecord> {
        self.pools.get(&pool_id)
    }

    /// Member addresses in join order.
    pub fn member_addresses(&self, pool_id: PoolId) -> Vec<Address> {
        self.members
            .get(&pool_id)
            .map(|members| members.iter().map(|m| m.address).collect())
            .unwrap_or_default()
    }

    /// Membership record of `address` in `pool_id`.
    pub fn member(&self, pool_id: PoolId, address: Address) -> Option<&PoolMember> {
        self.members
            .get(&pool_id)?
            .iter()
            .find(|m| m.address == address)
    }

    pub fn referrals(&self) -> &[Referral] {
        &self.referrals
    }

    /// Registers a new pool and returns its id.
    pub fn create_pool(
        &mut self,
        creator: Address,
        call: &CreatePoolCall,
        now: DateTime<Utc>,
    ) -> Result<PoolId, PoolError> {
        if call.name.trim().is_empty() {
            return Err(PoolError::InvalidParameters("empty name".into()));
        }
        if call.target_amount < POOL_MIN_TARGET || call.target_amount > POOL_MAX_TARGET {
            return Err(PoolError::InvalidParameters(format!(
                "target {}",
                call.target_amount
            )));
        }
        if !(POOL_MIN_MEMBERS..=POOL_MAX_MEMBERS).contains(&call.max_members) {
            return Err(PoolError::InvalidParameters(format!(
                "max members {}",
                call.max_members
            )));
        }
        let lock_range = MIN_LOCK_DAYS * SECONDS_PER_DAY..=MAX_LOCK_DAYS * SECONDS_PER_DAY;
        if !lock_range.contains(&call.lock_duration_secs) {
            return Err(PoolError::InvalidParameters(format!(
                "lock duration {}s",
                call.lock_duration_secs
            )));
        }

        let pool_id = PoolId(self.next_id);
        self.next_id += 1;
        self.pools.insert(
            pool_id,
            PoolRecord {
                pool_id,
                creator,
                name: call.name.clone(),
                description: call.description.clone(),
                target_amount: call.target_amount,
                current_amount: TokenAmount::ZERO,
                max_members: call.max_members,
                current_member_count: 0,
                lock_start: now,
                lock_end: now + Duration::seconds(call.lock_duration_secs as i64),
                is_active: true,
            },
        );
        self.members.insert(pool_id, Vec::new());
        Ok(pool_id)
    }

    /// Adds `address` as a member with `amount` as its first contribution.
    /// A zero `referrer` means none.
    pub fn join(
        &mut self,
        pool_id: PoolId,
        address: Address,
        amount: TokenAmount,
        referrer: Address,
        now: DateTime<Utc>,
    ) -> Result<(), PoolError> {
        let pool = self.open_pool(pool_id)?;
        if self.member(pool_id, address).is_some() {
            return Err(PoolError::AlreadyMember { pool_id, address });
        }
        if pool.current_member_count >= pool.max_members {
            return Err(PoolError::PoolFull(pool_id));
        }
        let current_amount = pool
            .current_amount
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;

        let pool = self
            .pools
            .get_mut(&pool_id)
            .ok_or(PoolError::PoolNotFound(pool_id))?;
        pool.current_amount = current_amount;
        pool.current_member_count += 1;
        self.members.entry(pool_id).or_default().push(PoolMember {
            pool_id,
            address,
            contributed: amount,
        });
        if !referrer.is_zero() && referrer != address {
            self.referrals.push(Referral {
                pool_id,
                member: address,
                referrer,
                joined_at: now,
            });
        }
        Ok(())
    }

    /// Adds `amount` to an existing member's contribution.
    pub fn contribute(
        &mut self,
        pool_id: PoolId,
        address: Address,
        amount: TokenAmount,
    ) -> Result<(), PoolError> {
        let pool = self.open_pool(pool_id)?;
        let current_amount = pool
            .current_amount
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;
        let member = self
            .members
            .get_mut(&pool_id)
            .and_then(|members| members.iter_mut().find(|m| m.address == address))
            .ok_or(PoolError::NotMember { pool_id, address })?;
        member.contributed = member
            .contributed
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;

        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.current_amount = current_amount;
        }
        Ok(())
    }

    fn open_pool(&self, pool_id: PoolId) -> Result<&PoolRecord, PoolError> {
        let pool = self
            .pools
            .get(&pool_id)
            .ok_or(PoolError::PoolNotFound(pool_id))?;
        if !pool.is_active {
            return Err(PoolError::PoolInactive(pool_id));
        }
        Ok(pool)
    }
}
