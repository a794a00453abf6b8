//! # Prometheus Metrics
//!
//! Counters and gauges for a scenario run, rendered once at the end in the
//! Prometheus text exposition format.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Holds all Prometheus metric handles for a run.
#[derive(Clone)]
pub struct RunMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Steps executed.
    pub steps_total: IntCounter,
    /// Steps that returned an error.
    pub steps_failed_total: IntCounter,
    /// Steps executed, by operation.
    pub operations_total: IntCounterVec,
    /// Failed steps, by error kind.
    pub failures_total: IntCounterVec,
    /// Clock height after the last step.
    pub block_height: IntGauge,
    /// Vault `total_assets` after the last step.
    pub vault_total_assets: IntGauge,
    /// Vault `total_supply` after the last step.
    pub vault_total_supply: IntGauge,
    /// Vault `total_trusted` after the last step.
    pub vault_total_trusted: IntGauge,
}

impl RunMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("portal".into()), None)?;

        let steps_total = IntCounter::new("steps_total", "Total number of script steps executed")?;
        registry.register(Box::new(steps_total.clone()))?;

        let steps_failed_total =
            IntCounter::new("steps_failed_total", "Number of script steps that failed")?;
        registry.register(Box::new(steps_failed_total.clone()))?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Script steps executed, by operation"),
            &["op"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("failures_total", "Failed script steps, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let block_height = IntGauge::new("block_height", "Ledger clock height")?;
        registry.register(Box::new(block_height.clone()))?;

        let vault_total_assets =
            IntGauge::new("vault_total_assets", "Assets under vault management")?;
        registry.register(Box::new(vault_total_assets.clone()))?;

        let vault_total_supply = IntGauge::new("vault_total_supply", "Vault shares in existence")?;
        registry.register(Box::new(vault_total_supply.clone()))?;

        let vault_total_trusted =
            IntGauge::new("vault_total_trusted", "Assets held by vault trustees")?;
        registry.register(Box::new(vault_total_trusted.clone()))?;

        Ok(Self {
            registry,
            steps_total,
            steps_failed_total,
            operations_total,
            failures_total,
            block_height,
            vault_total_assets,
            vault_total_supply,
            vault_total_trusted,
        })
    }

    /// Records one executed step.
    pub fn record_step(&self, op: &str, failure_kind: Option<&str>) {
        self.steps_total.inc();
        self.operations_total.with_label_values(&[op]).inc();
        if let Some(kind) = failure_kind {
            self.steps_failed_total.inc();
            self.failures_total.with_label_values(&[kind]).inc();
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Clamps a ledger amount into a gauge value.
pub fn gauge_value(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
