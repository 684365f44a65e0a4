//! Loss-less atomic reversal of applied patches
//!
//! A [`RollbackManager`] persists the forward unified diff of every applied
//! fix in a ticket-keyed registry, and can later revert the worktree with a
//! two-phase check-then-apply so a failed revert never leaves the tree
//! half-restored.

#![warn(unreachable_pub)]

mod manager;
mod registry;

pub use manager::RollbackManager;
pub use registry::PatchRegistry;

use std::path::PathBuf;

/// Rollback errors
///
/// Every failure path carries enough diagnostic text to act on without
/// re-running; on any error the worktree is guaranteed unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    /// A patch is already registered for this ticket (write-once registry)
    #[error("patch already registered for ticket {0}")]
    AlreadyRegistered(String),

    /// No patch is registered for this ticket
    #[error("nothing to roll back for ticket {0}")]
    NothingToRollBack(String),

    /// The reverse diff did not apply cleanly in the dry run
    #[error("reverse-apply dry run failed for ticket {ticket_id}: {diagnostic}")]
    CheckFailed {
        /// Ticket whose rollback was attempted
        ticket_id: String,
        /// Stderr of the underlying tool
        diagnostic: String,
    },

    /// The real reverse apply failed after a clean dry run
    #[error("reverse-apply failed for ticket {ticket_id}: {diagnostic}")]
    ApplyFailed {
        /// Ticket whose rollback was attempted
        ticket_id: String,
        /// Stderr of the underlying tool
        diagnostic: String,
    },

    /// The on-disk registry could not be parsed
    #[error("patch registry corrupt at {path}: {message}")]
    RegistryCorrupt {
        /// Registry file location
        path: PathBuf,
        /// Parse diagnostic
        message: String,
    },

    /// Filesystem or subprocess I/O failure
    #[error("rollback io failure: {0}")]
    Io(#[from] std::io::Error),
}
