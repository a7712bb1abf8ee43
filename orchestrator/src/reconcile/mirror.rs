//! Mirror sink boundary and an in-memory implementation.
//!
//! The mirror is an off-chain cache of vault and pool amounts owned by the
//! backend. The only write it accepts is an update-by-target carrying
//! `{currentAmountDelta, lastTxHash, actorAddress}`, and it must ignore a
//! `lastTxHash` it has already applied to that target.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::ledger::{Address, PoolId, TokenAmount, TxHash};

/// The mirror record a reconciliation updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MirrorTarget {
    /// A vault, identified by its owner.
    Vault(Address),
    /// A pool, identified by its ledger id.
    Pool(PoolId),
}

impl fmt::Display for MirrorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorTarget::Vault(owner) => write!(f, "vault:{owner}"),
            MirrorTarget::Pool(id) => write!(f, "pool:{id}"),
        }
    }
}

/// Payload of one mirror write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorUpdate {
    pub current_amount_delta: TokenAmount,
    /// Idempotency key.
    pub last_tx_hash: TxHash,
    pub actor_address: Address,
}

/// What the sink did with an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorWrite {
    Applied,
    /// `last_tx_hash` was already applied to this target; nothing changed.
    Duplicate,
}

/// Mirror sink failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("mirror store unreachable: {0}")]
    Unreachable(String),

    #[error("mirror store rejected the write: {0}")]
    Rejected(String),
}

/// The backend collaborator that holds mirror records.
#[async_trait]
pub trait MirrorSink: Send + Sync {
    /// Whether `tx_hash` has already been applied to `target`.
    async fn is_reconciled(&self, target: MirrorTarget, tx_hash: TxHash)
        -> Result<bool, MirrorError>;

    /// Applies `update` to `target`. Must answer
    /// [`MirrorWrite::Duplicate`] for a repeated `last_tx_hash`.
    async fn apply(
        &self,
        target: MirrorTarget,
        update: &MirrorUpdate,
    ) -> Result<MirrorWrite, MirrorError>;
}

/// Snapshot of one in-memory mirror record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirrorRecord {
    pub record_id: Uuid,
    pub current_amount: TokenAmount,
    pub last_tx_hash: Option<TxHash>,
    pub last_actor: Option<Address>,
    pub applied: HashSet<TxHash>,
    pub updated_at: DateTime<Utc>,
}

impl MirrorRecord {
    fn new() -> Self {
        Self {
            record_id: Uuid::new_v4(),
            current_amount: TokenAmount::ZERO,
            last_tx_hash: None,
            last_actor: None,
            applied: HashSet::new(),
            updated_at: Utc::now(),
        }
    }
}

/// [`MirrorSink`] backed by a concurrent map.
///
/// `set_unreachable(true)` makes every call fail with
/// [`MirrorError::Unreachable`] until cleared.
#[derive(Debug, Default)]
pub struct InMemoryMirror {
    records: DashMap<MirrorTarget, MirrorRecord>,
    unreachable: AtomicBool,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles the simulated outage.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Mirrored amount for `target`; zero if never written.
    pub fn amount(&self, target: MirrorTarget) -> TokenAmount {
        self.records
            .get(&target)
            .map(|record| record.current_amount)
            .unwrap_or(TokenAmount::ZERO)
    }

    /// Copy of the record for `target`.
    pub fn record(&self, target: MirrorTarget) -> Option<MirrorRecord> {
        self.records.get(&target).map(|record| record.clone())
    }

    fn check_reachable(&self) -> Result<(), MirrorError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(MirrorError::Unreachable("in-memory mirror offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorSink for InMemoryMirror {
    async fn is_reconciled(
        &self,
        target: MirrorTarget,
        tx_hash: TxHash,
    ) -> Result<bool, MirrorError> {
        self.check_reachable()?;
        Ok(self
            .records
            .get(&target)
            .map(|record| record.applied.contains(&tx_hash))
            .unwrap_or(false))
    }

    async fn apply(
        &self,
        target: MirrorTarget,
        update: &MirrorUpdate,
    ) -> Result<MirrorWrite, MirrorError> {
        self.check_reachable()?;
        let mut record = self.records.entry(target).or_insert_with(MirrorRecord::new);
        if record.applied.contains(&update.last_tx_hash) {
            return Ok(MirrorWrite::Duplicate);
        }

        let current_amount = record
            .current_amount
            .checked_add(update.current_amount_delta)
            .ok_or_else(|| MirrorError::Rejected(format!("amount overflow on {target}")))?;
        record.current_amount = current_amount;
        record.last_tx_hash = Some(update.last_tx_hash);
        record.last_actor = Some(update.actor_address);
        record.applied.insert(update.last_tx_hash);
        record.updated_at = Utc::now();
        debug!(%target, amount = %current_amount, tx_hash = %update.last_tx_hash, "mirror updated");
        Ok(MirrorWrite::Applied)
    }
}
