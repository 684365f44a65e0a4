//! Core types for the repair orchestrator
//!
//! Defines the fundamental types:
//! - Ticket identifiers and bug tickets
//! - Outcome history entries for the meta agent
//! - Orchestrator configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ulid::Ulid;

/// Unique ticket identifier
///
/// Ids are caller-supplied strings (defect trackers have their own naming);
/// [`TicketId::generate`] mints a ULID-backed id for tickets created
/// in-process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Mint a fresh ULID-backed id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// The id as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TicketId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One defect to be fixed
///
/// Immutable after ingestion; the priority score is recomputed on demand
/// rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugTicket {
    /// Unique identifier
    pub id: TicketId,
    /// Severity, 1..=max_severity (values above the cap saturate in scoring)
    pub severity: u8,
    /// Ingestion timestamp; priority ages from here
    pub arrived_at: DateTime<Utc>,
    /// Candidate files named by the reporter; empty means the whole filtered
    /// scope
    pub scope: Vec<PathBuf>,
}

impl BugTicket {
    /// Create a ticket arriving now
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<TicketId>, severity: u8) -> Self {
        Self {
            id: id.into(),
            severity,
            arrived_at: Utc::now(),
            scope: Vec::new(),
        }
    }

    /// With reporter-named candidate files
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, scope: Vec<PathBuf>) -> Self {
        self.scope = scope;
        self
    }

    /// With an explicit arrival timestamp
    #[inline]
    #[must_use]
    pub fn with_arrival(mut self, arrived_at: DateTime<Utc>) -> Self {
        self.arrived_at = arrived_at;
        self
    }

    /// Age of the ticket at `now`, in seconds; never negative
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.arrived_at).num_milliseconds();
        (millis.max(0) as f64) / 1000.0
    }
}

/// Outcome record for one completed ticket
///
/// Retained in the meta agent's bounded sliding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEntry {
    /// When the ticket completed
    pub recorded_at: DateTime<Utc>,
    /// Whether the fix was accepted
    pub success: bool,
    /// Resource cost (token-like units, or wall-clock milliseconds when the
    /// fixer reported none)
    pub cost: f64,
}

/// Orchestrator configuration
///
/// Validated once at startup via [`RepairConfig::validate`]; a configuration
/// violating the starvation-freedom inequality is a fatal error, never
/// silently corrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Severity cap; severities saturate here when scored
    pub max_severity: u8,
    /// Priority weight on normalized severity (α)
    pub severity_weight: f64,
    /// Priority weight on normalized age (β)
    pub age_weight: f64,
    /// Age at which a ticket's age term saturates, in seconds
    pub age_max_secs: f64,
    /// Total worker agents in the pool
    pub pool_size: u32,
    /// Agents granted per active ticket, all-or-nothing
    pub agents_per_ticket: u32,
    /// Canary verification command
    pub canary_program: String,
    /// Arguments for the canary command
    pub canary_args: Vec<String>,
    /// Hard wall-clock timeout for one canary run, in seconds
    pub canary_timeout_secs: u64,
    /// Sliding-window capacity W for the meta agent
    pub window_size: usize,
    /// Target success rate the meta agent steers towards
    pub success_target: f64,
    /// Dead band around the target before a nudge fires
    pub success_tolerance: f64,
    /// Step applied to the effort tunable per nudge
    pub effort_step: f64,
    /// Lower clamp for the effort tunable
    pub effort_min: f64,
    /// Upper clamp for the effort tunable
    pub effort_max: f64,
    /// Starting value of the effort tunable
    pub initial_effort: f64,
    /// Mean cost below which the cost budget is nudged up
    pub cost_low: f64,
    /// Mean cost above which the cost budget is nudged down
    pub cost_high: f64,
    /// Step applied to the cost-budget tunable per nudge
    pub budget_step: f64,
    /// Lower clamp for the cost budget
    pub budget_min: f64,
    /// Upper clamp for the cost budget
    pub budget_max: f64,
    /// Starting value of the cost budget
    pub initial_cost_budget: f64,
}

impl RepairConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With priority weights (α, β)
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, severity_weight: f64, age_weight: f64) -> Self {
        self.severity_weight = severity_weight;
        self.age_weight = age_weight;
        self
    }

    /// With pool geometry
    #[inline]
    #[must_use]
    pub fn with_pool(mut self, pool_size: u32, agents_per_ticket: u32) -> Self {
        self.pool_size = pool_size;
        self.agents_per_ticket = agents_per_ticket;
        self
    }

    /// With the canary verification command
    #[inline]
    #[must_use]
    pub fn with_canary(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.canary_program = program.into();
        self.canary_args = args;
        self
    }

    /// With the age saturation point
    #[inline]
    #[must_use]
    pub fn with_age_max_secs(mut self, age_max_secs: f64) -> Self {
        self.age_max_secs = age_max_secs;
        self
    }

    /// Validate the configuration; fatal on violation
    ///
    /// # Errors
    /// `ConfigError::StarvationRisk` when `β <= α·(MAX−1)/MAX`, which would
    /// let high-severity arrivals starve older low-severity tickets forever;
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        if self.max_severity < 1 {
            return Err(ConfigError::Invalid("max_severity must be >= 1".into()));
        }
        if self.agents_per_ticket < 1 || self.agents_per_ticket > self.pool_size {
            return Err(ConfigError::Invalid(format!(
                "agents_per_ticket must be in 1..={}, got {}",
                self.pool_size, self.agents_per_ticket
            )));
        }
        if !(self.age_max_secs > 0.0) {
            return Err(ConfigError::Invalid("age_max_secs must be positive".into()));
        }
        if self.severity_weight < 0.0 || self.age_weight < 0.0 {
            return Err(ConfigError::Invalid("priority weights must be non-negative".into()));
        }
        let threshold =
            self.severity_weight * f64::from(self.max_severity - 1) / f64::from(self.max_severity);
        if self.age_weight <= threshold {
            return Err(ConfigError::StarvationRisk {
                severity_weight: self.severity_weight,
                age_weight: self.age_weight,
                max_severity: self.max_severity,
            });
        }
        if self.window_size < 2 {
            return Err(ConfigError::Invalid("window_size must be >= 2".into()));
        }
        if self.effort_min > self.effort_max || self.budget_min > self.budget_max {
            return Err(ConfigError::Invalid("tunable bounds are inverted".into()));
        }
        if self.cost_low > self.cost_high {
            return Err(ConfigError::Invalid("cost thresholds are inverted".into()));
        }
        Ok(())
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_severity: 5,
            severity_weight: 0.40,
            age_weight: 0.60,
            age_max_secs: 3600.0,
            pool_size: 12,
            agents_per_ticket: 3,
            canary_program: "true".to_string(),
            canary_args: Vec::new(),
            canary_timeout_secs: 300,
            window_size: 20,
            success_target: 0.7,
            success_tolerance: 0.05,
            effort_step: 0.1,
            effort_min: 0.5,
            effort_max: 2.0,
            initial_effort: 1.0,
            cost_low: 1000.0,
            cost_high: 8000.0,
            budget_step: 500.0,
            budget_min: 1000.0,
            budget_max: 16000.0,
            initial_cost_budget: 8000.0,
        }
    }
}
