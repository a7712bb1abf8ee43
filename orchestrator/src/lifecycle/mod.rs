//! # Transaction Lifecycle
//!
//! ```text
//! pending.rs: PendingTransaction state machine, OperationKind
//! confirm.rs: timeout-bound confirmation wait, status re-check
//! ```

pub mod confirm;
pub mod pending;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

pub use confirm::{await_confirmation, recheck_status};
pub use pending::{OperationKind, PendingTransaction, TxPhase};

use crate::classifier::{ErrorClassifier, FailureContext};
use crate::error::ErrorKind;
use crate::ledger::{Address, Ledger, LedgerError, TxHash, TxReceipt};
use crate::metrics::OrchestratorMetrics;

/// What a successful ledger write hands back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxConfirmation {
    /// The mined transaction.
    pub tx_hash: TxHash,
    /// Block it was mined in.
    pub block_number: u64,
}

impl From<&TxReceipt> for TxConfirmation {
    fn from(receipt: &TxReceipt) -> Self {
        Self {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        }
    }
}

/// Awaits a submission future, then waits for the transaction to be mined.
///
/// Submission failures never produce a [`PendingTransaction`]: no hash came
/// back, so there is nothing to track.
pub(crate) async fn submit_and_confirm<F>(
    ledger: &dyn Ledger,
    ctx: FailureContext,
    timeout: Duration,
    metrics: &OrchestratorMetrics,
    submission: F,
) -> Result<(PendingTransaction, TxReceipt), ErrorKind>
where
    F: Future<Output = Result<TxHash, LedgerError>> + Send,
{
    let tx_hash = submission
        .await
        .map_err(|err| ErrorClassifier::classify_write(err, &ctx))?;
    metrics.record_submission(ctx.operation);
    info!(
        operation = %ctx.operation,
        address = %ctx.signer,
        tx_hash = %tx_hash,
        "transaction submitted"
    );

    let mut pending = PendingTransaction::submitted(ctx.operation, tx_hash);
    let receipt = await_confirmation(ledger, &mut pending, timeout, &ctx).await?;
    metrics.observe_confirmation(pending.elapsed_ms());
    Ok((pending, receipt))
}

/// Logs and counts a failed operation; passes the result through.
pub(crate) fn observe_outcome<T>(
    metrics: &OrchestratorMetrics,
    operation: OperationKind,
    address: Address,
    result: Result<T, ErrorKind>,
) -> Result<T, ErrorKind> {
    if let Err(err) = &result {
        metrics.record_failure(err);
        warn!(
            %operation,
            %address,
            kind = err.code(),
            tx_hash = ?err.tx_hash(),
            error = %err,
            "operation failed"
        );
    }
    result
}
