//! Seam to the external fixer collaborator
//!
//! Patch heuristics (what text to change) live outside this system. The
//! fixer edits the worktree itself and reports the forward unified diff of
//! what it changed; the orchestrator registers that diff for rollback and
//! verifies the result.

use crate::error::FixerError;
use crate::types::BugTicket;
use async_trait::async_trait;
use std::path::PathBuf;

/// A candidate fix the fixer has already applied to the worktree
#[derive(Debug, Clone)]
pub struct FixProposal {
    /// Forward unified diff of the applied change
    pub forward_diff: String,
    /// Resource cost of producing the fix, in token-like units; 0 when the
    /// fixer does not track cost
    pub cost: f64,
}

/// External collaborator that produces candidate fixes
#[async_trait]
pub trait Fixer: Send + Sync {
    /// Produce and apply a candidate fix for `ticket`, restricted to the
    /// files in `scope`
    ///
    /// # Errors
    /// `FixerError` when no usable patch could be produced; the worktree
    /// must be left unchanged in that case.
    async fn propose_fix(
        &self,
        ticket: &BugTicket,
        scope: &[PathBuf],
    ) -> Result<FixProposal, FixerError>;
}
