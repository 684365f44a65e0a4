//! Testing utilities for the MEDIC workspace
//!
//! Shared fixtures: a canned worktree with a known forward diff, a stub
//! fixer, and a capturing metric sink.

#![allow(missing_docs)]

use async_trait::async_trait;
use medic_core::{BugTicket, FixProposal, Fixer, FixerError, MetricSink, RepairConfig};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pre-patch content of the fixture file
pub const ORIGINAL: &str = "line one\nline two\nline three\n";
/// Post-patch content of the fixture file
pub const PATCHED: &str = "line one\nline two patched\nline three\n";
/// Forward unified diff from [`ORIGINAL`] to [`PATCHED`]
pub const FORWARD_DIFF: &str = "\
--- a/app.txt
+++ b/app.txt
@@ -1,3 +1,3 @@
 line one
-line two
+line two patched
 line three
";

/// Name of the fixture file inside the worktree
pub const FIXTURE_FILE: &str = "app.txt";

/// Initialize `dir` as a git worktree holding the fixture file at its
/// pre-patch state
///
/// `git apply` behaves best inside a repository, so rollback fixtures need
/// this even when no commits are made.
pub fn init_git_worktree(dir: &Path) -> PathBuf {
    let status = Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success());

    let file = dir.join(FIXTURE_FILE);
    fs::write(&file, ORIGINAL).unwrap();
    file
}

/// Configuration with a small pool and an always-passing canary, suitable
/// for fast end-to-end tests
pub fn sample_config() -> RepairConfig {
    RepairConfig::new()
        .with_pool(9, 3)
        .with_canary("true", Vec::new())
}

/// Fixer stub that writes [`PATCHED`] into the worktree and reports
/// [`FORWARD_DIFF`], or declines when constructed failing
pub struct StubFixer {
    worktree: PathBuf,
    cost: f64,
    fail: bool,
    /// Tickets the stub was asked to fix, in order
    pub calls: Mutex<Vec<String>>,
}

impl StubFixer {
    /// A stub that applies the canned patch and reports `cost`
    pub fn applying(worktree: &Path, cost: f64) -> Self {
        Self {
            worktree: worktree.to_path_buf(),
            cost,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A stub that always declines, leaving the worktree untouched
    pub fn failing(worktree: &Path) -> Self {
        Self {
            worktree: worktree.to_path_buf(),
            cost: 0.0,
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Fixer for StubFixer {
    async fn propose_fix(
        &self,
        ticket: &BugTicket,
        _scope: &[PathBuf],
    ) -> Result<FixProposal, FixerError> {
        self.calls.lock().push(ticket.id.as_str().to_string());
        if self.fail {
            return Err(FixerError::NoPatch("stub configured to fail".to_string()));
        }
        fs::write(self.worktree.join(FIXTURE_FILE), PATCHED)
            .map_err(|e| FixerError::Unavailable(e.to_string()))?;
        Ok(FixProposal {
            forward_diff: FORWARD_DIFF.to_string(),
            cost: self.cost,
        })
    }
}

/// Metric sink that records every measurement, optionally failing every send
pub struct CaptureSink {
    pub events: Mutex<Vec<(String, f64)>>,
    fail: bool,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
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
