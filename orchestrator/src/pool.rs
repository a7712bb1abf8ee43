//! # Pool Orchestrator
//!
//! Creates group pools and routes contributions into them.
//!
//! ## Pool ids
//!
//! `createPool` does not return the id the ledger assigned. It is only
//! announced in the `PoolCreated` event, so creation decodes the confirmed
//! receipt and treats a missing event as a revert: without the id the pool
//! is unusable.
//!
//! ## Join or contribute
//!
//! ```text
//!   getPoolMembers ──┬──► NotMember ──► joinPool(id, amount, flag, referrer)
//!                    └──► Member    ──► contributeToPool(id, amount, flag)
//! ```
//!
//! The branch is decided once, from the member list read under the
//! caller's lane. Capacity and membership can still change before the write
//! lands; `PoolFull` and `AlreadyMember` then come back from the contract
//! and are reported as they are. A failed write is never retried down the
//! other branch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::allowance::AllowanceGuard;
use crate::classifier::{ErrorClassifier, FailureContext};
use crate::config::OrchestratorConfig;
use crate::error::ErrorKind;
use crate::funds::ensure_funded;
use crate::ledger::{
    decode_pool_created, Address, CreatePoolCall, PoolEvent, PoolId, PoolLedger, PoolRecord,
    TokenAmount, TxHash, TxReceipt,
};
use crate::lifecycle::{
    observe_outcome, submit_and_confirm, OperationKind, PendingTransaction,
};
use crate::metrics::OrchestratorMetrics;
use crate::sequencer::AddressSequencer;
use crate::session::Session;
use crate::validation::{validate_pool, validate_transfer};

/// Arguments for [`PoolOrchestrator::create_pool`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatePoolRequest {
    pub name: String,
    pub description: String,
    pub target_amount: TokenAmount,
    pub max_members: u32,
    /// End of the lock window.
    pub deadline: DateTime<Utc>,
}

/// A confirmed pool creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolCreation {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Id read back from the `PoolCreated` event.
    pub pool_id: PoolId,
}

/// Whether an address belongs to a pool. There is no value before the
/// member list has been read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    NotMember,
    Member,
}

impl Membership {
    /// Resolves membership from a pool's member list.
    ///
    /// [`Address`] compares by bytes, so the hex case a binding reported
    /// the list in does not matter.
    pub fn resolve(members: &[Address], address: Address) -> Self {
        if members.contains(&address) {
            Membership::Member
        } else {
            Membership::NotMember
        }
    }

    /// The write this membership calls for.
    pub fn path(&self) -> ContributionPath {
        match self {
            Membership::NotMember => ContributionPath::Join,
            Membership::Member => ContributionPath::Contribute,
        }
    }
}

/// Which pool call carried a contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionPath {
    /// `joinPool`: registered membership and transferred the first amount.
    Join,
    /// `contributeToPool`: transferred value as an existing member.
    Contribute,
}

impl ContributionPath {
    /// The ledger operation behind this path.
    pub fn operation(&self) -> OperationKind {
        match self {
            ContributionPath::Join => OperationKind::JoinPool,
            ContributionPath::Contribute => OperationKind::ContributeToPool,
        }
    }
}

/// A confirmed contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolContribution {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub path: ContributionPath,
}

/// Creates pools and contributes to them.
pub struct PoolOrchestrator {
    config: Arc<OrchestratorConfig>,
    sequencer: Arc<AddressSequencer>,
    guard: AllowanceGuard,
    metrics: Arc<OrchestratorMetrics>,
}

impl PoolOrchestrator {
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

    /// Creates a pool and returns the id the ledger assigned to it.
    pub async fn create_pool(
        &self,
        session: &Session,
        request: &CreatePoolRequest,
    ) -> Result<PoolCreation, ErrorKind> {
        self.create_pool_at(session, request, Utc::now()).await
    }

    /// [`create_pool`](Self::create_pool) against an explicit clock.
    pub async fn create_pool_at(
        &self,
        session: &Session,
        request: &CreatePoolRequest,
        now: DateTime<Utc>,
    ) -> Result<PoolCreation, ErrorKind> {
        let address = session.address();
        let result: Result<PoolCreation, ErrorKind> = async {
            let lock_duration_secs = validate_pool(
                &request.name,
                request.target_amount,
                request.max_members,
                request.deadline,
                now,
            )?;
            let ledger = session.ledger();
            let lane = self.sequencer.acquire(address, ledger).await?;

            let call = CreatePoolCall {
                name: request.name.clone(),
                description: request.description.clone(),
                target_amount: request.target_amount,
                max_members: request.max_members,
                lock_duration_secs,
                token_flag: self.config.payment_asset.token_flag(),
            };
            let ctx = FailureContext::new(OperationKind::CreatePool, address);
            let (_, receipt) = submit_and_confirm(
                ledger,
                ctx,
                self.config.confirmation_timeout(),
                &self.metrics,
                ledger.create_pool(address, &call),
            )
            .await
            .map_err(|err| lane.note(err))?;

            match decode_pool_created(&receipt, self.config.contracts.pool) {
                PoolEvent::PoolCreated { pool_id, .. } => {
                    info!(
                        creator = %address,
                        %pool_id,
                        name = %request.name,
                        max_members = request.max_members,
                        "pool created"
                    );
                    Ok(PoolCreation {
                        tx_hash: receipt.tx_hash,
                        block_number: receipt.block_number,
                        pool_id,
                    })
                }
                PoolEvent::Unrecognized => {
                    warn!(
                        creator = %address,
                        tx_hash = %receipt.tx_hash,
                        logs = receipt.logs.len(),
                        "createPool confirmed without a PoolCreated event"
                    );
                    Err(ErrorKind::ContractReverted {
                        tx_hash: Some(receipt.tx_hash),
                        reason: "PoolCreated event missing from receipt".into(),
                    })
                }
            }
        }
        .await;
        observe_outcome(&self.metrics, OperationKind::CreatePool, address, result)
    }

    /// Puts `amount` into pool `pool_id`, joining it first if the caller is
    /// not yet a member.
    pub async fn contribute(
        &self,
        session: &Session,
        pool_id: PoolId,
        amount: TokenAmount,
    ) -> Result<PoolContribution, ErrorKind> {
        self.contribute_with_referrer(session, pool_id, amount, None)
            .await
    }

    /// [`contribute`](Self::contribute) with a referrer credited on the
    /// join branch. Ignored for existing members.
    pub async fn contribute_with_referrer(
        &self,
        session: &Session,
        pool_id: PoolId,
        amount: TokenAmount,
        referrer: Option<Address>,
    ) -> Result<PoolContribution, ErrorKind> {
        let (_, receipt, path) = self
            .contribute_tracked(session, pool_id, amount, referrer)
            .await?;
        Ok(PoolContribution {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            path,
        })
    }

    /// Contribution pipeline, keeping the lifecycle handle for
    /// reconciliation.
    pub(crate) async fn contribute_tracked(
        &self,
        session: &Session,
        pool_id: PoolId,
        amount: TokenAmount,
        referrer: Option<Address>,
    ) -> Result<(PendingTransaction, TxReceipt, ContributionPath), ErrorKind> {
        let address = session.address();
        // Until membership is read the failure is attributed to the join,
        // the call a first contribution would make.
        let mut operation = OperationKind::JoinPool;

        let result: Result<(PendingTransaction, TxReceipt, ContributionPath), ErrorKind> = async {
            validate_transfer(amount)?;
            let ledger = session.ledger();
            let lane = self.sequencer.acquire(address, ledger).await?;

            let members = ledger
                .pool_members(pool_id)
                .await
                .map_err(ErrorClassifier::classify_read)?;
            let membership = Membership::resolve(&members, address);
            let path = membership.path();
            operation = path.operation();
            debug!(%pool_id, %address, members = members.len(), ?membership, "membership resolved");

            let asset = self.config.payment_asset;
            ensure_funded(session, asset, &self.guard, self.config.contracts.pool, amount)
                .await
                .map_err(|err| lane.note(err))?;

            let ctx = FailureContext::new(path.operation(), address)
                .with_pool(pool_id)
                .with_amount(amount);
            let timeout = self.config.confirmation_timeout();
            let (pending, receipt) = match path {
                ContributionPath::Join => {
                    submit_and_confirm(
                        ledger,
                        ctx,
                        timeout,
                        &self.metrics,
                        ledger.join_pool(
                            address,
                            pool_id,
                            amount,
                            asset.token_flag(),
                            referrer.unwrap_or(Address::ZERO),
                        ),
                    )
                    .await
                    .map_err(|err| lane.note(err))?
                }
                ContributionPath::Contribute => {
                    submit_and_confirm(
                        ledger,
                        ctx,
                        timeout,
                        &self.metrics,
                        ledger.contribute_to_pool(address, pool_id, amount, asset.token_flag()),
                    )
                    .await
                    .map_err(|err| lane.note(err))?
                }
            };

            info!(
                %pool_id,
                member = %address,
                %amount,
                ?path,
                tx_hash = %pending.tx_hash(),
                "pool contribution confirmed"
            );
            Ok((pending, receipt, path))
        }
        .await;
        observe_outcome(&self.metrics, operation, address, result)
    }

    /// Reads pool `pool_id`.
    pub async fn pool(
        &self,
        session: &Session,
        pool_id: PoolId,
    ) -> Result<Option<PoolRecord>, ErrorKind> {
        session
            .ledger()
            .pool(pool_id)
            .await
            .map_err(ErrorClassifier::classify_read)
    }

    /// Reads the member list of pool `pool_id`.
    pub async fn members(
        &self,
        session: &Session,
        pool_id: PoolId,
    ) -> Result<Vec<Address>, ErrorKind> {
        session
            .ledger()
            .pool_members(pool_id)
            .await
            .map_err(ErrorClassifier::classify_read)
    }
}
