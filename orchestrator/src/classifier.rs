//! # Error Classification
//!
//! The single place where raw ledger failures turn into [`ErrorKind`]s.
//!
//! Revert reasons arrive as free text: a `require` string, a custom error
//! name with its arguments, sometimes prefixed by the RPC node with
//! `"execution reverted: "`. [`RevertReason::decode`] normalises that once
//! into a closed set; nothing downstream looks at the string again.

use crate::error::ErrorKind;
use crate::ledger::{Address, LedgerError, PoolId, TokenAmount, TxHash};
use crate::lifecycle::OperationKind;

// ---------------------------------------------------------------------------
// Revert Reasons
// ---------------------------------------------------------------------------

/// Revert reasons the contracts are known to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertReason {
    /// Pool is at `maxMembers`.
    PoolFull,
    /// `joinPool` by an existing member.
    AlreadyMember,
    /// `contributeToPool` by a non-member.
    NotMember,
    /// `deposit` without an active goal.
    NoActiveGoal,
    /// Token `transferFrom` exceeded the allowance.
    InsufficientAllowance,
    /// Token `transferFrom` exceeded the balance.
    InsufficientBalance,
    /// Anything else, verbatim. Empty when the ledger gave no reason.
    Unrecognized(String),
}

const KNOWN_REASONS: &[(&str, RevertReason)] = &[
    ("PoolFull", RevertReason::PoolFull),
    ("Pool is full", RevertReason::PoolFull),
    ("AlreadyMember", RevertReason::AlreadyMember),
    ("Already a member", RevertReason::AlreadyMember),
    ("NotMember", RevertReason::NotMember),
    ("Not a member", RevertReason::NotMember),
    ("NoActiveGoal", RevertReason::NoActiveGoal),
    ("No active goal", RevertReason::NoActiveGoal),
    ("ERC20InsufficientAllowance", RevertReason::InsufficientAllowance),
    ("ERC20: insufficient allowance", RevertReason::InsufficientAllowance),
    ("ERC20InsufficientBalance", RevertReason::InsufficientBalance),
    ("ERC20: transfer amount exceeds balance", RevertReason::InsufficientBalance),
];

impl RevertReason {
    /// Decodes a raw revert reason.
    ///
    /// Matching is on the whole normalised reason (node prefix stripped,
    /// custom-error arguments dropped), never on substrings.
    pub fn decode(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return RevertReason::Unrecognized(String::new());
        };
        let mut reason = raw.trim();
        for prefix in ["execution reverted:", "VM Exception while processing transaction: revert"] {
            if let Some(rest) = reason.strip_prefix(prefix) {
                reason = rest.trim();
            }
        }
        // `PoolFull(3)` → `PoolFull`
        let name = match reason.find('(') {
            Some(idx) if reason.ends_with(')') => &reason[..idx],
            _ => reason,
        };

        KNOWN_REASONS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, kind)| kind.clone())
            .unwrap_or_else(|| RevertReason::Unrecognized(raw.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// What the orchestrator was doing when a failure happened. Supplies the
/// identifiers the classified error carries.
#[derive(Clone, Debug)]
pub struct FailureContext {
    /// The operation being attempted.
    pub operation: OperationKind,
    /// The acting address.
    pub signer: Address,
    /// Value moved, for transfers and approvals.
    pub amount: Option<TokenAmount>,
    /// Target pool, for pool operations.
    pub pool_id: Option<PoolId>,
    /// The submitted transaction, once there is one.
    pub tx_hash: Option<TxHash>,
}

impl FailureContext {
    /// Context for `operation` by `signer`.
    pub fn new(operation: OperationKind, signer: Address) -> Self {
        Self {
            operation,
            signer,
            amount: None,
            pool_id: None,
            tx_hash: None,
        }
    }

    /// Attaches the transferred amount.
    pub fn with_amount(mut self, amount: TokenAmount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Attaches the pool id.
    pub fn with_pool(mut self, pool_id: PoolId) -> Self {
        self.pool_id = Some(pool_id);
        self
    }

    /// Attaches the transaction hash.
    pub fn with_tx(mut self, tx_hash: TxHash) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

/// Maps raw failures onto [`ErrorKind`].
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classifies a failed read. Reads never move value, so anything short
    /// of a signer rejection is reported as the ledger being unavailable.
    pub fn classify_read(err: LedgerError) -> ErrorKind {
        match err {
            LedgerError::SignerRejected(msg) => ErrorKind::UserRejected(msg),
            other => ErrorKind::LedgerUnavailable(other.to_string()),
        }
    }

    /// Classifies a failed submission or receipt wait. A transport or RPC
    /// error may have come after the node accepted the transaction, so it
    /// is never reported as a plain unavailability.
    pub fn classify_write(err: LedgerError, ctx: &FailureContext) -> ErrorKind {
        match err {
            LedgerError::SignerRejected(msg) => ErrorKind::UserRejected(msg),
            LedgerError::Reverted { reason } => Self::classify_revert(reason.as_deref(), ctx),
            other => ErrorKind::SubmissionUncertain(other.to_string()),
        }
    }

    /// Classifies a revert, whether from pre-flight simulation or a mined
    /// receipt.
    pub fn classify_revert(raw: Option<&str>, ctx: &FailureContext) -> ErrorKind {
        let unrecognized = || ErrorKind::ContractReverted {
            tx_hash: ctx.tx_hash,
            reason: raw.unwrap_or("<no reason>").to_string(),
        };

        match (RevertReason::decode(raw), ctx.pool_id, ctx.amount) {
            (RevertReason::PoolFull, Some(pool_id), _) => ErrorKind::PoolFull(pool_id),
            (RevertReason::AlreadyMember, Some(pool_id), _) => ErrorKind::AlreadyMember {
                pool_id,
                address: ctx.signer,
            },
            (RevertReason::NotMember, Some(pool_id), _) => ErrorKind::NotAMember {
                pool_id,
                address: ctx.signer,
            },
            (RevertReason::NoActiveGoal, _, _) if ctx.operation == OperationKind::Deposit => {
                ErrorKind::NoActiveVault(ctx.signer)
            }
            (RevertReason::InsufficientAllowance, _, Some(required)) => {
                ErrorKind::InsufficientAllowance {
                    required,
                    reason: raw.unwrap_or_default().to_string(),
                }
            }
            (RevertReason::InsufficientBalance, _, Some(required)) => {
                ErrorKind::InsufficientBalance {
                    required,
                    available: None,
                }
            }
            _ => unrecognized(),
        }
    }
}
