//! Error taxonomy for orchestrated ledger operations.
//!
//! Every public orchestrator method fails with exactly one [`ErrorKind`].
//! The set is closed: raw ledger failures are mapped into it once, at the
//! boundary, by [`crate::classifier::ErrorClassifier`]. Callers branch on
//! the variant, never on message text.

use thiserror::Error;

use crate::ledger::{Address, PoolId, TokenAmount, TxHash};

/// Classified failure of an orchestrated operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A local bound check failed. Nothing was sent to the ledger.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The payer cannot cover the amount.
    #[error("insufficient balance: required {required}{}", describe_available(.available))]
    InsufficientBalance {
        /// Amount the operation needs.
        required: TokenAmount,
        /// Balance observed, when it was read before submission.
        available: Option<TokenAmount>,
    },

    /// The spending authorization could not be raised to the required amount.
    #[error("insufficient allowance: could not authorize {required}: {reason}")]
    InsufficientAllowance {
        /// Allowance the operation needs.
        required: TokenAmount,
        /// Why the authorization did not go through.
        reason: String,
    },

    /// The signer declined. Never retried automatically.
    #[error("request rejected by signer: {0}")]
    UserRejected(String),

    /// The address has no active vault to deposit into.
    #[error("no active vault for {0}")]
    NoActiveVault(Address),

    /// The address is not a member of the pool.
    #[error("{address} is not a member of pool {pool_id}")]
    NotAMember {
        /// Pool in question.
        pool_id: PoolId,
        /// Address in question.
        address: Address,
    },

    /// The pool rejected the write because it is at capacity.
    #[error("pool {0} is full")]
    PoolFull(PoolId),

    /// The pool rejected a join because the address already joined.
    #[error("{address} is already a member of pool {pool_id}")]
    AlreadyMember {
        /// Pool in question.
        pool_id: PoolId,
        /// Address in question.
        address: Address,
    },

    /// The confirmation wait expired. The transaction may still be mined;
    /// re-check its status before doing anything else.
    #[error("no confirmation for {tx_hash} after {waited_ms}ms; status unknown, re-check before retrying")]
    NetworkTimeout {
        /// The submitted transaction.
        tx_hash: TxHash,
        /// How long the wait lasted.
        waited_ms: u64,
    },

    /// A revert whose reason is not one of the recognised kinds.
    #[error("contract reverted: {reason}")]
    ContractReverted {
        /// The transaction, when the revert happened on-chain.
        tx_hash: Option<TxHash>,
        /// Raw reason, kept verbatim for diagnostics.
        reason: String,
    },

    /// The transfer is final on-chain but the mirror update failed.
    /// Partial success: funds moved, status is still syncing.
    #[error("transaction {tx_hash} confirmed on-chain; mirror update pending: {reason}")]
    OnChainConfirmedMirrorPending {
        /// The confirmed transaction. Retry reconciliation with this key.
        tx_hash: TxHash,
        /// Why the mirror write failed.
        reason: String,
    },

    /// A read could not be served (RPC unreachable, malformed response).
    /// Nothing was submitted, so retrying is safe.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Sending a write failed on the wire. The node may still have
    /// broadcast it, and there is no hash to re-check: read balances
    /// before retrying.
    #[error("submission outcome unknown, check balances before retrying: {0}")]
    SubmissionUncertain(String),
}

fn describe_available(available: &Option<TokenAmount>) -> String {
    match available {
        Some(amount) => format!(", available {}", amount),
        None => String::new(),
    }
}

impl ErrorKind {
    /// Stable identifier for reports and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParameters(_) => "invalid_parameters",
            ErrorKind::InsufficientBalance { .. } => "insufficient_balance",
            ErrorKind::InsufficientAllowance { .. } => "insufficient_allowance",
            ErrorKind::UserRejected(_) => "user_rejected",
            ErrorKind::NoActiveVault(_) => "no_active_vault",
            ErrorKind::NotAMember { .. } => "not_a_member",
            ErrorKind::PoolFull(_) => "pool_full",
            ErrorKind::AlreadyMember { .. } => "already_member",
            ErrorKind::NetworkTimeout { .. } => "network_timeout",
            ErrorKind::ContractReverted { .. } => "contract_reverted",
            ErrorKind::OnChainConfirmedMirrorPending { .. } => "on_chain_confirmed_mirror_pending",
            ErrorKind::LedgerUnavailable(_) => "ledger_unavailable",
            ErrorKind::SubmissionUncertain(_) => "submission_uncertain",
        }
    }

    /// `true` when value has moved on-chain despite the error.
    pub fn is_partial_success(&self) -> bool {
        matches!(self, ErrorKind::OnChainConfirmedMirrorPending { .. })
    }

    /// `true` when the outcome is unknown and the transaction's status must
    /// be re-checked before any retry.
    pub fn requires_status_recheck(&self) -> bool {
        matches!(self, ErrorKind::NetworkTimeout { .. })
    }

    /// The transaction the error refers to, if one was submitted.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            ErrorKind::NetworkTimeout { tx_hash, .. }
            | ErrorKind::OnChainConfirmedMirrorPending { tx_hash, .. } => Some(*tx_hash),
            ErrorKind::ContractReverted { tx_hash, .. } => *tx_hash,
            _ => None,
        }
    }
}
