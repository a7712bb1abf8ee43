//! # Ledger Reconciliation
//!
//! Applies a confirmed on-chain transfer to the off-chain mirror exactly
//! once, keyed by transaction hash.
//!
//! A mirror failure after confirmation is not an operation failure: the
//! funds already moved. The reconciler keeps the update in a pending queue
//! and reports [`ErrorKind::OnChainConfirmedMirrorPending`]. An external
//! sweep calls [`LedgerReconciler::retry_pending`] to drain the queue; the
//! idempotency key makes a retry after a lost acknowledgement harmless.
//!
//! ```text
//! mirror.rs: MirrorSink boundary, InMemoryMirror
//! ```

pub mod mirror;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use mirror::{
    InMemoryMirror, MirrorError, MirrorRecord, MirrorSink, MirrorTarget, MirrorUpdate, MirrorWrite,
};

use crate::error::ErrorKind;
use crate::ledger::{Address, TokenAmount, TxHash};
use crate::lifecycle::{PendingTransaction, TxPhase};
use crate::metrics::OrchestratorMetrics;

/// Result of a successful reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The mirror took the update.
    Applied,
    /// The hash had already been applied; the mirror is unchanged.
    AlreadyApplied,
}

/// A confirmed transfer whose mirror update has not landed yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReconciliation {
    pub target: MirrorTarget,
    pub tx_hash: TxHash,
    pub delta: TokenAmount,
    pub actor: Address,
    /// Failed attempts so far.
    pub attempts: u32,
    pub last_error: String,
    pub first_failed_at: DateTime<Utc>,
}

impl PendingReconciliation {
    fn update(&self) -> MirrorUpdate {
        MirrorUpdate {
            current_amount_delta: self.delta,
            last_tx_hash: self.tx_hash,
            actor_address: self.actor,
        }
    }
}

/// Totals from one [`LedgerReconciler::retry_pending`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub applied: usize,
    pub already_applied: usize,
    pub still_pending: usize,
}

/// Writes confirmed transfers to the mirror, once per transaction hash.
pub struct LedgerReconciler {
    sink: Arc<dyn MirrorSink>,
    pending: DashMap<TxHash, PendingReconciliation>,
    metrics: Arc<OrchestratorMetrics>,
}

impl LedgerReconciler {
    pub fn new(sink: Arc<dyn MirrorSink>, metrics: Arc<OrchestratorMetrics>) -> Self {
        Self {
            sink,
            pending: DashMap::new(),
            metrics,
        }
    }

    /// Applies `delta` to `target` for confirmed transaction `tx_hash`.
    ///
    /// A hash the mirror already holds is a no-op success. If the mirror
    /// cannot be read or written the update is queued and
    /// [`ErrorKind::OnChainConfirmedMirrorPending`] is returned.
    pub async fn reconcile(
        &self,
        target: MirrorTarget,
        tx_hash: TxHash,
        delta: TokenAmount,
        actor: Address,
    ) -> Result<ReconcileOutcome, ErrorKind> {
        let update = MirrorUpdate {
            current_amount_delta: delta,
            last_tx_hash: tx_hash,
            actor_address: actor,
        };
        match self.write(target, &update).await {
            Ok(outcome) => {
                self.settle(tx_hash);
                Ok(outcome)
            }
            Err(err) => {
                let reason = err.to_string();
                self.enqueue(target, &update, &reason);
                warn!(%target, %tx_hash, %delta, error = %reason, "mirror update pending");
                Err(ErrorKind::OnChainConfirmedMirrorPending { tx_hash, reason })
            }
        }
    }

    /// Reconciles a tracked transaction and advances it to `Reconciled`.
    ///
    /// Only a `Confirmed` transaction is eligible; anything else is an
    /// [`ErrorKind::InvalidParameters`] and leaves the mirror untouched.
    pub async fn reconcile_pending(
        &self,
        pending: &mut PendingTransaction,
        target: MirrorTarget,
        delta: TokenAmount,
        actor: Address,
    ) -> Result<ReconcileOutcome, ErrorKind> {
        if pending.phase() != &TxPhase::Confirmed {
            return Err(ErrorKind::InvalidParameters(format!(
                "transaction {} is {:?}, only confirmed transactions reconcile",
                pending.tx_hash(),
                pending.phase()
            )));
        }
        let outcome = self
            .reconcile(target, pending.tx_hash(), delta, actor)
            .await?;
        pending.mark_reconciled();
        Ok(outcome)
    }

    /// Queued reconciliations, oldest first.
    pub fn pending(&self) -> Vec<PendingReconciliation> {
        let mut entries: Vec<_> = self.pending.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|entry| entry.first_failed_at);
        entries
    }

    /// Whether `tx_hash` is waiting for a mirror write.
    pub fn is_pending(&self, tx_hash: TxHash) -> bool {
        self.pending.contains_key(&tx_hash)
    }

    /// Re-applies every queued reconciliation once.
    pub async fn retry_pending(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for entry in self.pending() {
            let update = entry.update();
            match self.write(entry.target, &update).await {
                Ok(ReconcileOutcome::Applied) => {
                    report.applied += 1;
                    self.settle(entry.tx_hash);
                }
                Ok(ReconcileOutcome::AlreadyApplied) => {
                    report.already_applied += 1;
                    self.settle(entry.tx_hash);
                }
                Err(err) => {
                    report.still_pending += 1;
                    self.enqueue(entry.target, &update, &err.to_string());
                }
            }
        }
        info!(
            applied = report.applied,
            already_applied = report.already_applied,
            still_pending = report.still_pending,
            "mirror sweep finished"
        );
        report
    }

    async fn write(
        &self,
        target: MirrorTarget,
        update: &MirrorUpdate,
    ) -> Result<ReconcileOutcome, MirrorError> {
        if self.sink.is_reconciled(target, update.last_tx_hash).await? {
            debug!(%target, tx_hash = %update.last_tx_hash, "already reconciled");
            return Ok(ReconcileOutcome::AlreadyApplied);
        }
        let outcome = match self.sink.apply(target, update).await? {
            MirrorWrite::Applied => ReconcileOutcome::Applied,
            MirrorWrite::Duplicate => ReconcileOutcome::AlreadyApplied,
        };
        info!(
            %target,
            tx_hash = %update.last_tx_hash,
            delta = %update.current_amount_delta,
            ?outcome,
            "mirror reconciled"
        );
        Ok(outcome)
    }

    fn enqueue(&self, target: MirrorTarget, update: &MirrorUpdate, reason: &str) {
        self.pending
            .entry(update.last_tx_hash)
            .and_modify(|entry| {
                entry.attempts += 1;
                entry.last_error = reason.to_string();
            })
            .or_insert_with(|| PendingReconciliation {
                target,
                tx_hash: update.last_tx_hash,
                delta: update.current_amount_delta,
                actor: update.actor_address,
                attempts: 1,
                last_error: reason.to_string(),
                first_failed_at: Utc::now(),
            });
        self.metrics.set_mirror_pending(self.pending.len());
    }

    fn settle(&self, tx_hash: TxHash) {
        if self.pending.remove(&tx_hash).is_some() {
            self.metrics.set_mirror_pending(self.pending.len());
        }
    }
}
