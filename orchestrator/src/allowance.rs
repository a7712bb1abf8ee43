//! # Allowance Guard
//!
//! First half of the approve-then-act protocol. Before a contract can pull
//! tokens it needs an allowance; this guard reads the current one and only
//! submits an `approve` when it falls short.
//!
//! The approval is always for exactly the amount about to be spent, never
//! an unbounded one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::classifier::{ErrorClassifier, FailureContext};
use crate::error::ErrorKind;
use crate::ledger::{Address, TokenAmount, TokenLedger};
use crate::lifecycle::{submit_and_confirm, OperationKind};
use crate::metrics::OrchestratorMetrics;
use crate::session::Session;

/// Ensures a spender is authorized before a value-transferring call.
#[derive(Clone)]
pub struct AllowanceGuard {
    timeout: Duration,
    metrics: Arc<OrchestratorMetrics>,
}

impl AllowanceGuard {
    /// Guard whose approval waits are bounded by `timeout`.
    pub fn new(timeout: Duration, metrics: Arc<OrchestratorMetrics>) -> Self {
        Self { timeout, metrics }
    }

    /// Makes sure `spender` may pull at least `required` from the session's
    /// address.
    ///
    /// Returns without submitting anything if the current allowance already
    /// covers `required`. Otherwise approves exactly `required` and waits
    /// for the approval to be mined. A rejected signature yields
    /// [`ErrorKind::UserRejected`]; any other failure to confirm yields
    /// [`ErrorKind::InsufficientAllowance`], except a timeout or a failed
    /// send, which stay [`ErrorKind::NetworkTimeout`] and
    /// [`ErrorKind::SubmissionUncertain`] because the approval may still land.
    pub async fn ensure_allowance(
        &self,
        session: &Session,
        spender: Address,
        required: TokenAmount,
    ) -> Result<(), ErrorKind> {
        let owner = session.address();
        let ledger = session.ledger();

        let current = ledger
            .allowance(owner, spender)
            .await
            .map_err(ErrorClassifier::classify_read)?;
        debug!(%owner, %spender, %current, %required, "allowance read");

        if current >= required {
            self.metrics.record_allowance_skipped();
            return Ok(());
        }

        self.metrics.record_allowance_submitted();
        let ctx = FailureContext::new(OperationKind::Approve, owner).with_amount(required);
        let result = submit_and_confirm(
            ledger,
            ctx,
            self.timeout,
            &self.metrics,
            ledger.approve(owner, spender, required),
        )
        .await;

        match result {
            Ok((pending, _receipt)) => {
                info!(%owner, %spender, %required, tx_hash = %pending.tx_hash(), "allowance raised");
                Ok(())
            }
            Err(err @ (ErrorKind::UserRejected(_) | ErrorKind::NetworkTimeout { .. })) => Err(err),
            Err(ErrorKind::SubmissionUncertain(reason)) => {
                warn!(%owner, %spender, %reason, "approval could not be submitted");
                Err(ErrorKind::SubmissionUncertain(reason))
            }
            Err(other) => {
                warn!(%owner, %spender, error = %other, "approval failed to confirm");
                Err(ErrorKind::InsufficientAllowance {
                    required,
                    reason: other.to_string(),
                })
            }
        }
    }
}
