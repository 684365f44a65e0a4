//! Orchestration core for the automated defect-repair system
//!
//! This crate holds the scheduling machinery:
//! - [`types`]: tickets, outcome records, configuration
//! - [`state`]: the ticket lifecycle state machine
//! - [`resource`]: all-or-nothing agent-pool accounting
//! - [`prioritiser`]: starvation-free priority scoring
//! - [`fixer`]: the seam to the external patch producer
//! - [`meta`]: windowed adaptive tuning of effort and budget
//! - [`metrics`]: the telemetry sink capability
//! - [`scheduler`]: the orchestrator tying it all together
//!
//! Scope clamping, patch rollback, and verification live in their own
//! crates (`medic-scope`, `medic-rollback`, `medic-verify`) and are
//! re-exported here for convenience.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod fixer;
pub mod meta;
pub mod metrics;
pub mod prioritiser;
pub mod resource;
pub mod scheduler;
pub mod state;
pub mod types;

pub use error::{CapacityError, ConfigError, FixerError, SchedulerError};
pub use fixer::{FixProposal, Fixer};
pub use meta::{MetaAgent, Tunables};
pub use metrics::{MetricSink, TracingSink};
pub use prioritiser::Prioritiser;
pub use resource::ResourcePool;
pub use scheduler::{Scheduler, TicketReport};
pub use state::TicketState;
pub use types::{BugTicket, OutcomeEntry, RepairConfig, TicketId};

pub use medic_rollback::RollbackManager;
pub use medic_scope::ScopeFilter;
pub use medic_verify::{CanaryResult, CanaryRunner, SmokeOutcome, SmokeRunner, VerifyStatus};

/// Crate version, for diagnostics
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
