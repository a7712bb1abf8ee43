//! Raw failures reported by a ledger binding.
//!
//! These are deliberately unclassified: a binding reports what happened on
//! the wire, and [`crate::classifier`] decides what it means for the caller.

use thiserror::Error;

use super::types::TxHash;

/// A failure surfaced by a ledger read, write, or receipt wait.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The signer declined to sign the request.
    #[error("signer rejected the request: {0}")]
    SignerRejected(String),

    /// The call reverted, either during pre-flight simulation or on-chain.
    #[error("execution reverted: {}", .reason.as_deref().unwrap_or("<no reason>"))]
    Reverted {
        /// Revert reason string or custom error name, if the ledger gave one.
        reason: Option<String>,
    },

    /// The RPC endpoint could not be reached or dropped the connection.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The RPC endpoint answered with a JSON-RPC error object.
    #[error("ledger rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// A receipt or status was requested for a hash the ledger never saw.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),
}
