//! # Vault Orchestrator
//!
//! Drives the single-vault-per-address savings contract.
//!
//! The vault has no identifier of its own: the ledger keys it by owner
//! address, so the caller's address *is* the vault id. Nothing here
//! generates or stores a separate one.
//!
//! ## Deposit pipeline
//!
//! ```text
//! validate amount ─► hasGoal? ─► balance ≥ amount? ─► allowance ─► deposit ─► confirm
//!      │                │               │                  │
//!  InvalidParameters  NoActiveVault  InsufficientBalance  approve(amount) if short
//! ```
//!
//! Each precondition short-circuits, so a deposit that is certain to fail
//! never costs a transaction. Mirror reconciliation is the caller's job
//! (see [`crate::service::SavingsService`]).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::allowance::AllowanceGuard;
use crate::classifier::{ErrorClassifier, FailureContext};
use crate::config::OrchestratorConfig;
use crate::error::ErrorKind;
use crate::funds::ensure_funded;
use crate::ledger::{Address, TokenAmount, TxReceipt, VaultLedger, VaultRecord};
use crate::lifecycle::{
    observe_outcome, submit_and_confirm, OperationKind, PendingTransaction, TxConfirmation,
};
use crate::metrics::OrchestratorMetrics;
use crate::sequencer::AddressSequencer;
use crate::session::Session;
use crate::validation::{validate_goal, validate_transfer};

/// Creates vaults and deposits into them.
pub struct VaultOrchestrator {
    config: Arc<OrchestratorConfig>,
    sequencer: Arc<AddressSequencer>,
    guard: AllowanceGuard,
    metrics: Arc<OrchestratorMetrics>,
}

impl VaultOrchestrator {
    /// Builds an orchestrator. Share `sequencer` with every other
    /// orchestrator acting for the same addresses.
    pub fn new(
        config: Arc<OrchestratorConfig>,
        sequencer: Arc<AddressSequencer>,
        metrics: Arc<OrchestratorMetrics>,
    ) -> Self {
        let guard = AllowanceGuard::new(config.confirmation_timeout(), Arc::clone(&metrics));
        Self {
            config,
            sequencer,
            guard,
            metrics,
        }
    }

    /// Creates the caller's vault with a lock window ending at `deadline`.
    ///
    /// Target and lock window are checked locally first; out-of-range
    /// values fail with [`ErrorKind::InvalidParameters`] and no ledger call.
    pub async fn create_goal(
        &self,
        session: &Session,
        target_amount: TokenAmount,
        deadline: DateTime<Utc>,
    ) -> Result<TxConfirmation, ErrorKind> {
        self.create_goal_at(session, target_amount, deadline, Utc::now())
            .await
    }

    /// [`create_goal`](Self::create_goal) against an explicit clock.
    pub async fn create_goal_at(
        &self,
        session: &Session,
        target_amount: TokenAmount,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TxConfirmation, ErrorKind> {
        let address = session.address();
        let result: Result<TxConfirmation, ErrorKind> = async {
            let params = validate_goal(target_amount, deadline, now)?;
            let ledger = session.ledger();
            let lane = self.sequencer.acquire(address, ledger).await?;

            // No hasGoal pre-check: what the vault contract does with a
            // second goal is its call, and we surface whatever it says.
            let ctx = FailureContext::new(OperationKind::CreateGoal, address);
            let (_, receipt) = submit_and_confirm(
                ledger,
                ctx,
                self.config.confirmation_timeout(),
                &self.metrics,
                ledger.create_goal(
                    address,
                    params.target_amount,
                    params.lock_duration_secs,
                    self.config.payment_asset.token_flag(),
                ),
            )
            .await
            .map_err(|err| lane.note(err))?;

            info!(vault = %address, target = %params.target_amount, "savings goal created");
            Ok(TxConfirmation::from(&receipt))
        }
        .await;
        observe_outcome(&self.metrics, OperationKind::CreateGoal, address, result)
    }

    /// Deposits `amount` into the caller's vault.
    ///
    /// Does not touch the mirror; pair with
    /// [`LedgerReconciler::reconcile`](crate::reconcile::LedgerReconciler::reconcile).
    pub async fn deposit(
        &self,
        session: &Session,
        amount: TokenAmount,
    ) -> Result<TxConfirmation, ErrorKind> {
        self.deposit_tracked(session, amount)
            .await
            .map(|(_, receipt)| TxConfirmation::from(&receipt))
    }

    /// [`deposit`](Self::deposit), keeping the confirmed transaction's
    /// lifecycle handle for reconciliation.
    pub(crate) async fn deposit_tracked(
        &self,
        session: &Session,
        amount: TokenAmount,
    ) -> Result<(PendingTransaction, TxReceipt), ErrorKind> {
        let address = session.address();
        let result: Result<(PendingTransaction, TxReceipt), ErrorKind> = async {
            validate_transfer(amount)?;
            let ledger = session.ledger();
            let lane = self.sequencer.acquire(address, ledger).await?;

            let has_goal = ledger
                .has_goal(address)
                .await
                .map_err(ErrorClassifier::classify_read)?;
            debug!(vault = %address, has_goal, "vault lookup");
            if !has_goal {
                return Err(ErrorKind::NoActiveVault(address));
            }

            let asset = self.config.payment_asset;
            ensure_funded(session, asset, &self.guard, self.config.contracts.vault, amount)
                .await
                .map_err(|err| lane.note(err))?;

            let ctx = FailureContext::new(OperationKind::Deposit, address).with_amount(amount);
            let confirmed = submit_and_confirm(
                ledger,
                ctx,
                self.config.confirmation_timeout(),
                &self.metrics,
                ledger.deposit(address, amount, asset.token_flag()),
            )
            .await
            .map_err(|err| lane.note(err))?;

            info!(vault = %address, %amount, tx_hash = %confirmed.0.tx_hash(), "deposit confirmed");
            Ok(confirmed)
        }
        .await;
        observe_outcome(&self.metrics, OperationKind::Deposit, address, result)
    }

    /// Reads the vault owned by `owner`.
    pub async fn goal(
        &self,
        session: &Session,
        owner: Address,
    ) -> Result<Option<VaultRecord>, ErrorKind> {
        session
            .ledger()
            .goal(owner)
            .await
            .map_err(ErrorClassifier::classify_read)
    }
}
