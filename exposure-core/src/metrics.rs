//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `exposure_increases_total` - Successful increase operations
//! - `exposure_reductions_total` - Successful giver-initiated reductions
//! - `exposure_takes_total` - Successful takes
//! - `exposure_taken_units_total` - Token units drawn through takes
//! - `exposure_op_duration_seconds` - Histogram of operation latencies

use prometheus::{Counter, Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;
use token_ledger::Amount;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful increases
    pub increases_total: IntCounter,

    /// Successful giver-initiated reductions
    pub reductions_total: IntCounter,

    /// Successful takes
    pub takes_total: IntCounter,

    /// Token units drawn through takes
    pub taken_units_total: Counter,

    /// Operation duration histogram
    pub op_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let increases_total = IntCounter::with_opts(Opts::new(
            "exposure_increases_total",
            "Successful increase operations",
        ))?;
        registry.register(Box::new(increases_total.clone()))?;

        let reductions_total = IntCounter::with_opts(Opts::new(
            "exposure_reductions_total",
            "Successful giver-initiated reductions",
        ))?;
        registry.register(Box::new(reductions_total.clone()))?;

        let takes_total = IntCounter::with_opts(Opts::new(
            "exposure_takes_total",
            "Successful takes",
        ))?;
        registry.register(Box::new(takes_total.clone()))?;

        let taken_units_total = Counter::with_opts(Opts::new(
            "exposure_taken_units_total",
            "Token units drawn through takes",
        ))?;
        registry.register(Box::new(taken_units_total.clone()))?;

        let op_duration = Histogram::with_opts(
            HistogramOpts::new(
                "exposure_op_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100]),
        )?;
        registry.register(Box::new(op_duration.clone()))?;

        Ok(Self {
            increases_total,
            reductions_total,
            takes_total,
            taken_units_total,
            op_duration,
            registry,
        })
    }

    /// Record successful increase
    pub fn record_increase(&self) {
        self.increases_total.inc();
    }

    /// Record successful reduction
    pub fn record_reduce(&self) {
        self.reductions_total.inc();
    }

    /// Record successful take of `units`
    pub fn record_take(&self, units: Amount) {
        self.takes_total.inc();
        self.taken_units_total.inc_by(units as f64);
    }

    /// Record operation duration
    pub fn record_op_duration(&self, duration_seconds: f64) {
        self.op_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
