//! # Pending Transaction State Machine
//!
//! Tracks one submitted transaction for the duration of a single
//! orchestration call:
//!
//! ```text
//!   Submitted ──► Confirmed ──► Reconciled
//!       │
//!       └──────► Failed
//! ```
//!
//! `Confirmed` without `Reconciled` is a legitimate resting state: the
//! transfer happened on-chain but the mirror write did not. A confirmation
//! timeout leaves the transaction in `Submitted`, because a timeout says
//! nothing about whether it will be mined.
//!
//! Terminal states are immutable; transitions out of them are ignored.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ledger::TxHash;

/// The ledger operation a transaction performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Token `approve`.
    Approve,
    /// Vault `createGoal`.
    CreateGoal,
    /// Vault `deposit`.
    Deposit,
    /// Pool `createPool`.
    CreatePool,
    /// Pool `joinPool`.
    JoinPool,
    /// Pool `contributeToPool`.
    ContributeToPool,
}

impl OperationKind {
    /// Snake-case name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Approve => "approve",
            OperationKind::CreateGoal => "create_goal",
            OperationKind::Deposit => "deposit",
            OperationKind::CreatePool => "create_pool",
            OperationKind::JoinPool => "join_pool",
            OperationKind::ContributeToPool => "contribute_to_pool",
        }
    }

    /// Whether the operation moves value (and so needs reconciliation).
    pub fn transfers_value(&self) -> bool {
        matches!(
            self,
            OperationKind::Deposit | OperationKind::JoinPool | OperationKind::ContributeToPool
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxPhase {
    /// Accepted by the ledger, not yet mined (or outcome unknown).
    Submitted,
    /// Mined successfully.
    Confirmed,
    /// Terminal: mirror updated.
    Reconciled,
    /// Terminal: rejected, reverted, or otherwise failed to confirm.
    Failed(String),
}

/// One in-flight transaction. Never persisted.
#[derive(Debug)]
pub struct PendingTransaction {
    operation: OperationKind,
    tx_hash: TxHash,
    phase: TxPhase,
    submitted_at: Instant,
}

impl PendingTransaction {
    /// Starts tracking a freshly submitted transaction.
    pub fn submitted(operation: OperationKind, tx_hash: TxHash) -> Self {
        Self {
            operation,
            tx_hash,
            phase: TxPhase::Submitted,
            submitted_at: Instant::now(),
        }
    }

    /// The operation this transaction performs.
    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// The tracked transaction hash.
    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Current phase.
    pub fn phase(&self) -> &TxPhase {
        &self.phase
    }

    /// Submitted → Confirmed.
    pub fn mark_confirmed(&mut self) {
        if self.phase == TxPhase::Submitted {
            self.phase = TxPhase::Confirmed;
        }
    }

    /// Confirmed → Reconciled.
    pub fn mark_reconciled(&mut self) {
        if self.phase == TxPhase::Confirmed {
            self.phase = TxPhase::Reconciled;
        }
    }

    /// Submitted → Failed. A confirmed transaction cannot fail afterwards;
    /// a mirror problem leaves it `Confirmed`.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        if self.phase == TxPhase::Submitted {
            self.phase = TxPhase::Failed(reason.into());
        }
    }

    /// `true` once mined successfully, whether or not reconciled.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.phase, TxPhase::Confirmed | TxPhase::Reconciled)
    }

    /// `true` in `Reconciled` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, TxPhase::Reconciled | TxPhase::Failed(_))
    }

    /// Milliseconds since submission.
    pub fn elapsed_ms(&self) -> u64 {
        self.submitted_at.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> PendingTransaction {
        PendingTransaction::submitted(OperationKind::Deposit, TxHash::from_bytes([3u8; 32]))
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut p = tx();
        assert_eq!(p.phase(), &TxPhase::Submitted);
        assert!(!p.is_terminal());

        p.mark_confirmed();
        assert!(p.is_confirmed());
        assert!(!p.is_terminal());

        p.mark_reconciled();
        assert_eq!(p.phase(), &TxPhase::Reconciled);
        assert!(p.is_terminal());
    }

    #[test]
    fn cannot_reconcile_before_confirmation() {
        let mut p = tx();
        p.mark_reconciled();
        assert_eq!(p.phase(), &TxPhase::Submitted);
    }

    #[test]
    fn confirmed_transaction_cannot_fail() {
        let mut p = tx();
        p.mark_confirmed();
        p.mark_failed("mirror down");
        assert_eq!(p.phase(), &TxPhase::Confirmed);
    }

    #[test]
    fn failed_is_terminal() {
        let mut p = tx();
        p.mark_failed("reverted");
        p.mark_confirmed();
        assert!(matches!(p.phase(), TxPhase::Failed(r) if r == "reverted"));
        assert!(p.is_terminal());
    }

    #[test]
    fn only_transfers_need_reconciliation() {
        assert!(OperationKind::Deposit.transfers_value());
        assert!(OperationKind::JoinPool.transfers_value());
        assert!(!OperationKind::Approve.transfers_value());
        assert!(!OperationKind::CreatePool.transfers_value());
    }
}
