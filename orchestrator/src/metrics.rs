//! # Prometheus Metrics
//!
//! Operational counters for the orchestration layer. All metrics live in a
//! dedicated [`prometheus::Registry`] so embedding applications can merge
//! or expose them however they like.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::error::ErrorKind;
use crate::lifecycle::OperationKind;

/// Metric handles for one orchestrator instance.
///
/// Cheap to clone: prometheus handles are reference counted.
#[derive(Clone)]
pub struct OrchestratorMetrics {
    registry: Registry,
    /// Transactions submitted, by operation.
    pub transactions_submitted_total: IntCounterVec,
    /// Allowance checks, by outcome (`skipped` or `submitted`).
    pub allowance_checks_total: IntCounterVec,
    /// Failed operations, by error kind.
    pub failures_total: IntCounterVec,
    /// Reconciliations waiting for a retry sweep.
    pub mirror_pending: IntGauge,
    /// Submission-to-receipt latency.
    pub confirmation_latency_seconds: Histogram,
}

impl OrchestratorMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("savings".into()), None)?;

        let transactions_submitted_total = IntCounterVec::new(
            Opts::new(
                "transactions_submitted_total",
                "Transactions submitted to the ledger",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(transactions_submitted_total.clone()))?;

        let allowance_checks_total = IntCounterVec::new(
            Opts::new(
                "allowance_checks_total",
                "Allowance checks, split by whether an approval was needed",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(allowance_checks_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("failures_total", "Failed operations by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let mirror_pending = IntGauge::new(
            "mirror_pending",
            "Confirmed transfers whose mirror update is pending",
        )?;
        registry.register(Box::new(mirror_pending.clone()))?;

        let confirmation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to mined receipt",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(confirmation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            transactions_submitted_total,
            allowance_checks_total,
            failures_total,
            mirror_pending,
            confirmation_latency_seconds,
        })
    }

    /// Counts a submitted transaction.
    pub fn record_submission(&self, operation: OperationKind) {
        self.transactions_submitted_total
            .with_label_values(&[operation.as_str()])
            .inc();
    }

    /// Counts an allowance check that needed no approval.
    pub fn record_allowance_skipped(&self) {
        self.allowance_checks_total
            .with_label_values(&["skipped"])
            .inc();
    }

    /// Counts an allowance check that submitted an approval.
    pub fn record_allowance_submitted(&self) {
        self.allowance_checks_total
            .with_label_values(&["submitted"])
            .inc();
    }

    /// Counts a classified failure.
    pub fn record_failure(&self, err: &ErrorKind) {
        self.failures_total.with_label_values(&[err.code()]).inc();
    }

    /// Records how long a confirmation took.
    pub fn observe_confirmation(&self, elapsed_ms: u64) {
        self.confirmation_latency_seconds
            .observe(elapsed_ms as f64 / 1_000.0);
    }

    /// Sets the pending-mirror gauge.
    pub fn set_mirror_pending(&self, count: usize) {
        self.mirror_pending.set(count as i64);
    }

    /// Encodes all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
