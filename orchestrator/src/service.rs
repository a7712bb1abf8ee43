//! # Savings Service
//!
//! Wires the orchestrators to one sequencer, one metrics registry and one
//! reconciler, and runs the full flow for value transfers:
//!
//! ```text
//! deposit / contribute ─► confirm ─► reconcile ─► Settlement
//!                                        │
//!                                        └─► OnChainConfirmedMirrorPending
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::config::OrchestratorConfig;
use crate::error::ErrorKind;
use crate::ledger::{Address, PoolId, TokenAmount, TxHash, TxReceipt};
use crate::lifecycle::PendingTransaction;
use crate::metrics::OrchestratorMetrics;
use crate::pool::{ContributionPath, PoolOrchestrator};
use crate::reconcile::{LedgerReconciler, MirrorSink, MirrorTarget, ReconcileOutcome};
use crate::sequencer::AddressSequencer;
use crate::session::Session;
use crate::vault::VaultOrchestrator;

/// A transfer that is confirmed on-chain and applied to the mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub mirror: ReconcileOutcome,
    /// Set for pool contributions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ContributionPath>,
}

/// The orchestration layer, assembled.
pub struct SavingsService {
    config: Arc<OrchestratorConfig>,
    metrics: Arc<OrchestratorMetrics>,
    vault: VaultOrchestrator,
    pools: PoolOrchestrator,
    reconciler: LedgerReconciler,
}

impl SavingsService {
    pub fn new(
        config: OrchestratorConfig,
        sink: Arc<dyn MirrorSink>,
        metrics: Arc<OrchestratorMetrics>,
    ) -> Self {
        let config = Arc::new(config);
        let sequencer = Arc::new(AddressSequencer::new());
        Self {
            vault: VaultOrchestrator::new(
                Arc::clone(&config),
                Arc::clone(&sequencer),
                Arc::clone(&metrics),
            ),
            pools: PoolOrchestrator::new(
                Arc::clone(&config),
                Arc::clone(&sequencer),
                Arc::clone(&metrics),
            ),
            reconciler: LedgerReconciler::new(sink, Arc::clone(&metrics)),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &OrchestratorMetrics {
        &self.metrics
    }

    pub fn vault(&self) -> &VaultOrchestrator {
        &self.vault
    }

    pub fn pools(&self) -> &PoolOrchestrator {
        &self.pools
    }

    pub fn reconciler(&self) -> &LedgerReconciler {
        &self.reconciler
    }

    /// Deposits into the caller's vault and mirrors the deposit.
    pub async fn deposit_and_reconcile(
        &self,
        session: &Session,
        amount: TokenAmount,
    ) -> Result<Settlement, ErrorKind> {
        let (pending, receipt) = self.vault.deposit_tracked(session, amount).await?;
        let target = MirrorTarget::Vault(session.address());
        self.settle(pending, &receipt, target, amount, session.address(), None)
            .await
    }

    /// Contributes to a pool (joining if needed) and mirrors the transfer.
    pub async fn contribute_and_reconcile(
        &self,
        session: &Session,
        pool_id: PoolId,
        amount: TokenAmount,
        referrer: Option<Address>,
    ) -> Result<Settlement, ErrorKind> {
        let (pending, receipt, path) = self
            .pools
            .contribute_tracked(session, pool_id, amount, referrer)
            .await?;
        let target = MirrorTarget::Pool(pool_id);
        self.settle(pending, &receipt, target, amount, session.address(), Some(path))
            .await
    }

    async fn settle(
        &self,
        mut pending: PendingTransaction,
        receipt: &TxReceipt,
        target: MirrorTarget,
        amount: TokenAmount,
        actor: Address,
        path: Option<ContributionPath>,
    ) -> Result<Settlement, ErrorKind> {
        let mirror = self
            .reconciler
            .reconcile_pending(&mut pending, target, amount, actor)
            .await?;
        Ok(Settlement {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            mirror,
            path,
        })
    }
}
