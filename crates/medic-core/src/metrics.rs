//! Telemetry sink capability
//!
//! Any backend may implement [`MetricSink`]; the meta agent emits through it
//! best-effort, and an emission failure never affects scheduling.

/// Capability with a single operation: record one named measurement
pub trait MetricSink: Send + Sync {
    /// Record `name` = `value` with the given tags
    ///
    /// # Errors
    /// Backend-specific; callers treat failures as non-fatal.
    fn send(&self, name: &str, value: f64, tags: &[(&str, &str)]) -> anyhow::Result<()>;
}

/// Default sink that logs measurements through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn send(&self, name: &str, value: f64, tags: &[(&str, &str)]) -> anyhow::Result<()> {
        tracing::info!(target: "medic::metrics", name, value, ?tags, "metric");
        Ok(())
    }
}
