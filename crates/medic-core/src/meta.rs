//! Meta agent: adaptive tuning from outcome history
//!
//! Observes a bounded sliding window of completed-ticket outcomes and nudges
//! two numeric tunables — fix effort and cost budget — by fixed, clamped
//! steps. It never touches business logic. After each adjustment the oldest
//! half of the window is evicted so the same data cannot immediately
//! re-trigger a nudge.

use crate::metrics::MetricSink;
use crate::types::{OutcomeEntry, RepairConfig};
use std::collections::VecDeque;
use std::sync::Arc;

/// Tunables the meta agent owns exclusively
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunables {
    /// Fix-effort multiplier handed to the fixer
    pub effort: f64,
    /// Per-ticket resource budget, token-like units
    pub cost_budget: f64,
}

/// Windowed outcome observer that adjusts the tunables
pub struct MetaAgent {
    window: VecDeque<OutcomeEntry>,
    window_size: usize,
    success_target: f64,
    success_tolerance: f64,
    effort_step: f64,
    effort_min: f64,
    effort_max: f64,
    cost_low: f64,
    cost_high: f64,
    budget_step: f64,
    budget_min: f64,
    budget_max: f64,
    tunables: Tunables,
    sink: Arc<dyn MetricSink>,
}

impl std::fmt::Debug for MetaAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaAgent")
            .field("window_len", &self.window.len())
            .field("window_size", &self.window_size)
            .field("tunables", &self.tunables)
            .finish_non_exhaustive()
    }
}

impl MetaAgent {
    /// Create a meta agent from validated configuration
    #[must_use]
    pub fn new(config: &RepairConfig, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_size),
            window_size: config.window_size,
            success_target: config.success_target,
            success_tolerance: config.success_tolerance,
            effort_step: config.effort_step,
            effort_min: config.effort_min,
            effort_max: config.effort_max,
            cost_low: config.cost_low,
            cost_high: config.cost_high,
            budget_step: config.budget_step,
            budget_min: config.budget_min,
            budget_max: config.budget_max,
            tunables: Tunables {
                effort: config.initial_effort.clamp(config.effort_min, config.effort_max),
                cost_budget: config
                    .initial_cost_budget
                    .clamp(config.budget_min, config.budget_max),
            },
            sink,
        }
    }

    /// Current tunable values
    #[inline]
    #[must_use]
    pub fn tunables(&self) -> Tunables {
        self.tunables
    }

    /// Outcomes currently held in the window
    #[inline]
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Record one completed-ticket outcome; retunes when the window fills
    pub fn record(&mut self, entry: OutcomeEntry) {
        self.window.push_back(entry);
        if self.window.len() >= self.window_size {
            self.retune();
        }
    }

    fn retune(&mut self) {
        let n = self.window.len() as f64;
        let successes = self.window.iter().filter(|e| e.success).count() as f64;
        let success_rate = successes / n;
        let mean_cost = self.window.iter().map(|e| e.cost).sum::<f64>() / n;

        let before = self.tunables;

        if success_rate < self.success_target - self.success_tolerance {
            self.tunables.effort =
                (self.tunables.effort + self.effort_step).clamp(self.effort_min, self.effort_max);
        } else if success_rate > self.success_target + self.success_tolerance {
            self.tunables.effort =
                (self.tunables.effort - self.effort_step).clamp(self.effort_min, self.effort_max);
        }

        if mean_cost > self.cost_high {
            self.tunables.cost_budget = (self.tunables.cost_budget - self.budget_step)
                .clamp(self.budget_min, self.budget_max);
        } else if mean_cost < self.cost_low {
            self.tunables.cost_budget = (self.tunables.cost_budget + self.budget_step)
                .clamp(self.budget_min, self.budget_max);
        }

        // Evict the oldest half of the window
        self.window.drain(..self.window.len() / 2);

        tracing::info!(
            success_rate,
            mean_cost,
            effort = self.tunables.effort,
            cost_budget = self.tunables.cost_budget,
            "meta agent retuned"
        );

        let measurements = [
            ("meta.success_rate", success_rate),
            ("meta.mean_cost", mean_cost),
            ("meta.effort", self.tunables.effort),
            ("meta.cost_budget", self.tunables.cost_budget),
            ("meta.effort_delta", self.tunables.effort - before.effort),
            (
                "meta.cost_budget_delta",
                self.tunables.cost_budget - before.cost_budget,
            ),
        ];
        for (name, value) in measurements {
            if let Err(e) = self.sink.send(name, value, &[]) {
                tracing::warn!(name, error = %e, "metric emission failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    struct CaptureSink {
        events: Mutex<Vec<(String, f64)>>,
        fail: bool,
    }

    impl CaptureSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl MetricSink for CaptureSink {
        fn send(&self, name: &str, value: f64, _tags: &[(&str, &str)]) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink offline");
            }
            self.events.lock().push((name.to_string(), value));
            Ok(())
        }
    }

    fn outcome(success: bool, cost: f64) -> OutcomeEntry {
        OutcomeEntry {
            recorded_at: Utc::now(),
            success,
            cost,
        }
    }

    fn small_window_config() -> RepairConfig {
        let mut config = RepairConfig::default();
        config.window_size = 4;
        config
    }

    #[test]
    fn low_success_rate_nudges_effort_up() {
        let sink = CaptureSink::new(false);
        let mut meta = MetaAgent::new(&small_window_config(), sink.clone());
        let before = meta.tunables().effort;

        for _ in 0..4 {
            meta.record(outcome(false, 2000.0));
        }

        assert!((meta.tunables().effort - (before + 0.1)).abs() < 1e-9);
        // Oldest half evicted
        assert_eq!(meta.window_len(), 2);
        assert!(sink
            .events
            .lock()
            .iter()
            .any(|(name, value)| name == "meta.success_rate" && *value == 0.0));
    }

    #[test]
    fn high_success_rate_nudges_effort_down() {
        let sink = CaptureSink::new(false);
        let mut meta = MetaAgent::new(&small_window_config(), sink);
        let before = meta.tunables().effort;

        for _ in 0..4 {
            meta.record(outcome(true, 2000.0));
        }

        assert!((meta.tunables().effort - (before - 0.1)).abs() < 1e-9);
    }

    #[test]
    fn effort_is_clamped_at_the_bounds() {
        let sink = CaptureSink::new(false);
        let mut config = small_window_config();
        config.initial_effort = config.effort_max;
        let mut meta = MetaAgent::new(&config, sink);

        // Repeated failure pressure cannot push past the clamp
        for _ in 0..20 {
            meta.record(outcome(false, 2000.0));
        }
        assert_eq!(meta.tunables().effort, config.effort_max);
    }

    #[test]
    fn mean_cost_steers_the_budget() {
        let sink = CaptureSink::new(false);
        let config = small_window_config();
        let mut meta = MetaAgent::new(&config, sink);
        let before = meta.tunables().cost_budget;

        // Mean cost above cost_high: budget down
        for _ in 0..4 {
            // Success rate inside the dead band: 3/4 = 0.75 vs target 0.7±0.05
            meta.record(outcome(true, 10_000.0));
        }
        assert!((meta.tunables().cost_budget - (before - config.budget_step)).abs() < 1e-9);

        // Flush the expensive half out, then a cheap window nudges it back up
        for _ in 0..4 {
            meta.record(outcome(true, 10.0));
        }
        assert!((meta.tunables().cost_budget - before).abs() < 1e-9);
    }

    #[test]
    fn sink_failure_does_not_affect_tuning() {
        let sink = CaptureSink::new(true);
        let mut meta = MetaAgent::new(&small_window_config(), sink);
        let before = meta.tunables().effort;

        for _ in 0..4 {
            meta.record(outcome(false, 2000.0));
        }

        // Tuning proceeded despite the failing sink
        assert!(meta.tunables().effort > before);
    }
}
