//! Error types for the orchestration core
//!
//! Taxonomy per the error-handling design:
//! - Configuration errors are fatal at startup
//! - Capacity errors are rejected synchronously, per ticket
//! - Rollback and scope errors are wrapped with the ticket they affect
//! - Verification faults never surface here: they are data
//!   (`medic_verify::CanaryResult`), not errors

use crate::state::TicketState;
use crate::types::TicketId;

/// Fatal configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The priority weights admit starvation
    #[error(
        "starvation risk: age weight {age_weight} must exceed \
         {severity_weight} * ({max_severity} - 1) / {max_severity}"
    )]
    StarvationRisk {
        /// Configured α
        severity_weight: f64,
        /// Configured β
        age_weight: f64,
        /// Configured severity cap
        max_severity: u8,
    },

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Capacity accounting errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CapacityError {
    /// The ticket already holds an allocation block
    #[error("ticket {0} already holds an allocation")]
    AlreadyAllocated(TicketId),

    /// Not enough free agents for a full block
    #[error("insufficient capacity: {needed} agents needed, {free} free")]
    Insufficient {
        /// Block size requested
        needed: u32,
        /// Free agents available
        free: u32,
    },

    /// The pool accounting no longer balances; unrecoverable programming
    /// error
    #[error("capacity invariant violated: free {free} + allocated {allocated} != pool {pool}")]
    InvariantViolated {
        /// Free agents recorded
        free: u32,
        /// Sum of all allocation blocks
        allocated: u32,
        /// Configured pool size
        pool: u32,
    },
}

impl CapacityError {
    /// Invariant violations halt the affected ticket; everything else is an
    /// ordinary synchronous rejection
    #[inline]
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolated { .. })
    }
}

/// Errors from the external fixer collaborator
#[derive(Debug, thiserror::Error)]
pub enum FixerError {
    /// The fixer could not run at all
    #[error("fixer unavailable: {0}")]
    Unavailable(String),

    /// The fixer ran but produced no usable patch
    #[error("fixer produced no patch: {0}")]
    NoPatch(String),
}

/// Scheduler errors; every variant names the ticket it concerns
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Fatal configuration error at construction
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Capacity accounting failed for a ticket
    #[error("capacity error for ticket {ticket_id}: {source}")]
    Capacity {
        /// Affected ticket
        ticket_id: TicketId,
        /// Underlying capacity error
        #[source]
        source: CapacityError,
    },

    /// Scope filtering failed for a ticket
    #[error("scope error for ticket {ticket_id}: {source}")]
    Scope {
        /// Affected ticket
        ticket_id: TicketId,
        /// Underlying scope error
        #[source]
        source: medic_scope::ScopeError,
    },

    /// Patch registration or reversal failed; the ticket is parked for
    /// operator intervention
    #[error("rollback error for ticket {ticket_id}: {source}")]
    Rollback {
        /// Affected ticket
        ticket_id: TicketId,
        /// Underlying rollback error
        #[source]
        source: medic_rollback::RollbackError,
    },

    /// A state transition outside the lifecycle diagram was attempted
    #[error("illegal transition for ticket {ticket_id}: {from} -> {to}")]
    InvalidTransition {
        /// Affected ticket
        ticket_id: TicketId,
        /// State the ticket was in
        from: TicketState,
        /// State that was requested
        to: TicketState,
    },

    /// The ticket id is not known to the scheduler
    #[error("unknown ticket {0}")]
    UnknownTicket(TicketId),

    /// A ticket with this id was already submitted
    #[error("duplicate ticket {0}")]
    DuplicateTicket(TicketId),

    /// The ticket failed ingestion validation
    #[error("invalid ticket {ticket_id}: {message}")]
    InvalidTicket {
        /// Affected ticket
        ticket_id: TicketId,
        /// What was wrong
        message: String,
    },
}

impl SchedulerError {
    /// The ticket this error concerns, when it is per-ticket
    #[must_use]
    pub fn ticket_id(&self) -> Option<&TicketId> {
        match self {
            Self::Config(_) => None,
            Self::Capacity { ticket_id, .. }
            | Self::Scope { ticket_id, .. }
            | Self::Rollback { ticket_id, .. }
            | Self::InvalidTransition { ticket_id, .. }
            | Self::InvalidTicket { ticket_id, .. } => Some(ticket_id),
            Self::UnknownTicket(id) | Self::DuplicateTicket(id) => Some(id),
        }
    }

    /// Whether the whole scheduler must stop, as opposed to parking one
    /// ticket
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Capacity { source, .. } => source.is_invariant_violation(),
            _ => false,
        }
    }
}
