// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Savings Orchestrator Core Library
//!
//! Drives irreversible, multi-step operations against an on-chain savings
//! vault and group pool, and keeps an off-chain mirror of their amounts
//! consistent with the ledger.
//!
//! The ledger is the source of truth. Every write here is checked locally
//! first, authorized with an exact-amount approval when needed, confirmed
//! under a timeout, and then applied to the mirror once per transaction
//! hash.
//!
//! ## Architecture
//!
//! - **ledger**: The read/write boundary, its value types and event decoding.
//! - **allowance**: Approve-then-act: raises allowances only when short.
//! - **vault**: One vault per address: create, deposit, read.
//! - **pool**: Pool creation and the join-vs-contribute branch.
//! - **reconcile**: Idempotent mirror updates and the pending-mirror queue.
//! - **classifier**: Raw ledger failures → [`ErrorKind`].
//! - **lifecycle**: `Submitted → Confirmed → Reconciled | Failed`.
//! - **sequencer**: Per-address serialization of orchestration calls.
//! - **service**: Everything above, wired together.
//! - **config**: Protocol bounds and runtime configuration.
//!
//! ## Ground Rules
//!
//! 1. A call that is certain to fail never costs a transaction.
//! 2. A timeout is not a failure. Re-check, never resubmit.
//! 3. Funds that moved are never reported as funds that did not.

pub mod allowance;
pub mod classifier;
pub mod config;
pub mod error;
mod funds;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod pool;
pub mod reconcile;
pub mod report;
pub mod sequencer;
pub mod service;
pub mod session;
pub mod validation;
pub mod vault;

pub use allowance::AllowanceGuard;
pub use classifier::{ErrorClassifier, FailureContext, RevertReason};
pub use config::{ConfigError, ContractAddresses, OrchestratorConfig};
pub use error::ErrorKind;
pub use ledger::{
    Address, Ledger, LedgerError, PaymentAsset, PoolId, PoolLedger, ReceiptLedger, TokenAmount,
    TokenLedger, TxHash, TxReceipt, TxStatus, VaultLedger,
};
pub use lifecycle::{recheck_status, OperationKind, PendingTransaction, TxConfirmation, TxPhase};
pub use metrics::OrchestratorMetrics;
pub use pool::{
    ContributionPath, CreatePoolRequest, Membership, PoolContribution, PoolCreation,
    PoolOrchestrator,
};
pub use reconcile::{
    InMemoryMirror, LedgerReconciler, MirrorError, MirrorSink, MirrorTarget, MirrorUpdate,
    MirrorWrite, PendingReconciliation, ReconcileOutcome, SweepReport,
};
pub use report::{OperationReport, ReportStatus};
pub use sequencer::{AddressSequencer, Lane};
pub use service::{SavingsService, Settlement};
pub use session::{Session, SessionProvider};
pub use vault::VaultOrchestrator;
