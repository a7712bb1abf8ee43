//! Caller-facing result envelope.
//!
//! Orchestrator methods return `Result<T, ErrorKind>`; this flattens that
//! into the `{success, value}` / `{success: false, errorKind, message}`
//! shape that UI and scripting callers branch on.

use serde::Serialize;

use crate::error::ErrorKind;
use crate::ledger::TxHash;

/// Coarse outcome of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Confirmed,
    Failed,
    /// Funds moved; the mirror is still syncing.
    MirrorPending,
    /// The confirmation wait expired. Re-check before retrying.
    StatusUnknown,
}

/// Serializable outcome of one orchestrator call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport<T> {
    pub success: bool,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

impl<T> OperationReport<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            status: ReportStatus::Confirmed,
            value: Some(value),
            error_kind: None,
            message: None,
            tx_hash: None,
        }
    }

    pub fn from_error(err: &ErrorKind) -> Self {
        let status = if err.is_partial_success() {
            ReportStatus::MirrorPending
        } else if err.requires_status_recheck() {
            ReportStatus::StatusUnknown
        } else {
            ReportStatus::Failed
        };
        Self {
            // A pending mirror still means the transfer happened.
            success: status == ReportStatus::MirrorPending,
            status,
            value: None,
            error_kind: Some(err.code()),
            message: Some(err.to_string()),
            tx_hash: err.tx_hash(),
        }
    }
}

impl<T> From<Result<T, ErrorKind>> for OperationReport<T> {
    fn from(result: Result<T, ErrorKind>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::from_error(&err),
        }
    }
}
