//! Metrics collection for observability
//!
//! Each ledger owns its own Prometheus registry, so several ledgers can live in
//! one process (tests, a ledger next to its spender relay).
//!
//! # Metrics
//!
//! - `<ns>_operations_total{operation}` - Committed operations
//! - `<ns>_rejections_total{operation,kind}` - Rejected operations by error kind
//! - `<ns>_cycles_mined_total` - Successful netting passes
//! - `<ns>_netted_amount_total` - Debt cancelled across all cycle edges

use prometheus::{Counter, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed operations
    pub operations: IntCounterVec,

    /// Rejected operations
    pub rejections: IntCounterVec,

    /// Successful netting passes
    pub cycles_mined: IntCounter,

    /// Debt cancelled by netting
    pub netted_amount: Counter,

    registry: Registry,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new(namespace: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("operations_total", "Committed ledger operations").namespace(namespace),
            &["operation"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new("rejections_total", "Rejected ledger operations").namespace(namespace),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        let cycles_mined = IntCounter::with_opts(
            Opts::new("cycles_mined_total", "Successful netting passes").namespace(namespace),
        )?;
        registry.register(Box::new(cycles_mined.clone()))?;

        let netted_amount = Counter::with_opts(
            Opts::new("netted_amount_total", "Debt cancelled per cycle edge").namespace(namespace),
        )?;
        registry.register(Box::new(netted_amount.clone()))?;

        Ok(Self {
            operations,
            rejections,
            cycles_mined,
            netted_amount,
            registry,
        })
    }

    /// Record a committed operation
    pub fn record_commit(&self, operation: &str) {
        self.operations.with_label_values(&[operation]).inc();
    }

    /// Record a rejected operation
    pub fn record_rejection(&self, operation: &str, kind: &str) {
        self.rejections.with_label_values(&[operation, kind]).inc();
    }

    /// Registry holding this ledger's metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render in the Prometheus text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("cycles_mined", &self.cycles_mined.get())
            .finish_non_exhaustive()
    }
}
