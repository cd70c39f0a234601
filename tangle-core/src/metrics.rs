//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the tangle. Each engine owns its own
//! registry, so any number of engines can live in one process.
//!
//! # Metrics
//!
//! - `tangle_transactions_total` - Transactions committed to the store
//! - `tangle_rejected_total{reason}` - Inserts rejected, by error reason
//! - `tangle_insufficient_tips_total` - Parent selections that were clamped
//! - `tangle_tips` - Current number of tips
//! - `tangle_validated` - Validated transactions after the last consensus pass
//! - `tangle_consensus_duration_seconds` - Histogram of consensus pass latencies

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::{fmt, sync::Arc};

/// Metrics collector
#[derive(Clone)]
pub struct TangleMetrics {
    /// Transactions committed
    pub transactions_total: IntCounter,

    /// Rejected inserts by reason
    pub rejected_total: IntCounterVec,

    /// Clamped parent selections
    pub insufficient_tips_total: IntCounter,

    /// Current tip count
    pub tips: IntGauge,

    /// Validated transactions
    pub validated: IntGauge,

    /// Consensus pass duration histogram
    pub consensus_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl TangleMetrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounter::new(
            "tangle_transactions_total",
            "Transactions committed to the store",
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("tangle_rejected_total", "Inserts rejected, by error reason"),
            &["reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let insufficient_tips_total = IntCounter::new(
            "tangle_insufficient_tips_total",
            "Parent selections clamped to the available tips",
        )?;
        registry.register(Box::new(insufficient_tips_total.clone()))?;

        let tips = IntGauge::new("tangle_tips", "Current number of tips")?;
        registry.register(Box::new(tips.clone()))?;

        let validated = IntGauge::new(
            "tangle_validated",
            "Validated transactions after the last consensus pass",
        )?;
        registry.register(Box::new(validated.clone()))?;

        let consensus_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tangle_consensus_duration_seconds",
                "Histogram of consensus pass latencies",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(consensus_duration.clone()))?;

        Ok(Self {
            transactions_total,
            rejected_total,
            insufficient_tips_total,
            tips,
            validated,
            consensus_duration,
            registry,
        })
    }

    /// Record committed transactions
    pub fn record_inserted(&self, count: usize) {
        self.transactions_total.inc_by(count as u64);
    }

    /// Record a rejected insert
    pub fn record_rejection(&self, reason: &str) {
        self.rejected_total.with_label_values(&[reason]).inc();
    }

    /// Record a clamped parent selection
    pub fn record_insufficient_tips(&self) {
        self.insufficient_tips_total.inc();
    }

    /// Update tip count
    pub fn update_tips(&self, count: usize) {
        self.tips.set(count as i64);
    }

    /// Record the outcome of a consensus pass
    pub fn record_consensus(&self, duration_seconds: f64, validated_total: usize) {
        self.consensus_duration.observe(duration_seconds);
        self.validated.set(validated_total as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl fmt::Debug for TangleMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TangleMetrics")
            .field("transactions_total", &self.transactions_total.get())
            .field("tips", &self.tips.get())
            .field("validated", &self.validated.get())
            .finish_non_exhaustive()
    }
}
