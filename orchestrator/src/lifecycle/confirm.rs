//! Confirmation waits and status re-checks.
//!
//! The wait is the only cancellable part of a transaction's life. When it
//! runs out the transaction is *not* failed: it stays `Submitted` and the
//! caller gets [`ErrorKind::NetworkTimeout`], which demands a
//! [`recheck_status`] before anything is retried. Resubmitting blindly could
//! move the same funds twice.

use std::time::Duration;

use tracing::{info, warn};

use crate::classifier::{ErrorClassifier, FailureContext};
use crate::error::ErrorKind;
use crate::ledger::{
    Ledger, LedgerError, ReceiptLedger, ReceiptStatus, TxHash, TxReceipt, TxStatus,
};

use super::pending::PendingTransaction;

/// Waits up to `timeout` for `pending` to be mined and advances its phase.
///
/// * mined, success → `Confirmed`, returns the receipt
/// * mined, reverted → `Failed`, returns the classified revert
/// * wait expired or the receipt stream broke → stays `Submitted`,
///   returns [`ErrorKind::NetworkTimeout`]
pub async fn await_confirmation(
    ledger: &dyn Ledger,
    pending: &mut PendingTransaction,
    timeout: Duration,
    ctx: &FailureContext,
) -> Result<TxReceipt, ErrorKind> {
    let tx_hash = pending.tx_hash();
    let ctx = ctx.clone().with_tx(tx_hash);

    let receipt = match tokio::time::timeout(timeout, ledger.wait_for_receipt(tx_hash)).await {
        Err(_) => {
            warn!(
                operation = %pending.operation(),
                tx_hash = %tx_hash,
                timeout_ms = timeout.as_millis() as u64,
                "confirmation wait expired; transaction outcome unknown"
            );
            return Err(ErrorKind::NetworkTimeout {
                tx_hash,
                waited_ms: timeout.as_millis() as u64,
            });
        }
        Ok(Err(LedgerError::Reverted { reason })) => {
            let kind = ErrorClassifier::classify_revert(reason.as_deref(), &ctx);
            pending.mark_failed(kind.to_string());
            return Err(kind);
        }
        Ok(Err(err)) => {
            // The transaction is out there; a broken wait tells us nothing
            // about whether it lands.
            warn!(
                operation = %pending.operation(),
                tx_hash = %tx_hash,
                error = %err,
                "receipt wait failed; transaction outcome unknown"
            );
            return Err(ErrorKind::NetworkTimeout {
                tx_hash,
                waited_ms: pending.elapsed_ms(),
            });
        }
        Ok(Ok(receipt)) => receipt,
    };

    match &receipt.status {
        ReceiptStatus::Success => {
            pending.mark_confirmed();
            info!(
                operation = %pending.operation(),
                tx_hash = %tx_hash,
                block = receipt.block_number,
                elapsed_ms = pending.elapsed_ms(),
                "transaction confirmed"
            );
            Ok(receipt)
        }
        ReceiptStatus::Reverted { reason } => {
            let kind = ErrorClassifier::classify_revert(reason.as_deref(), &ctx);
            pending.mark_failed(kind.to_string());
            warn!(
                operation = %pending.operation(),
                tx_hash = %tx_hash,
                kind = kind.code(),
                "transaction reverted"
            );
            Err(kind)
        }
    }
}

/// Explicit status re-check, the required follow-up to a
/// [`ErrorKind::NetworkTimeout`].
pub async fn recheck_status(ledger: &dyn Ledger, tx_hash: TxHash) -> Result<TxStatus, ErrorKind> {
    match ledger.transaction_status(tx_hash).await {
        Ok(status) => Ok(status),
        Err(LedgerError::UnknownTransaction(_)) => Ok(TxStatus::Unknown),
        Err(err) => Err(ErrorClassifier::classify_read(err)),
    }
}
