//! Two-phase patch reversal
//!
//! Phase (a) dry-runs the reverse diff with `git apply --reverse --check`;
//! phase (b) applies it for real only after (a) passes. A failure in either
//! phase leaves the worktree untouched and surfaces the tool's stderr.
//!
//! The caller must hold exclusive access to the worktree for the duration of
//! a rollback call; the two phases must not interleave with other mutations.

use crate::registry::PatchRegistry;
use crate::RollbackError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Owns the patch registry and reverts applied patches
#[derive(Debug)]
pub struct RollbackManager {
    registry: PatchRegistry,
    worktree: PathBuf,
}

impl RollbackManager {
    /// Open a manager storing patches under `patch_dir`, reverting against
    /// `worktree`
    ///
    /// # Errors
    /// Propagates registry open failures.
    pub fn open(patch_dir: &Path, worktree: &Path) -> Result<Self, RollbackError> {
        Ok(Self {
            registry: PatchRegistry::open(patch_dir)?,
            worktree: worktree.to_path_buf(),
        })
    }

    /// The worktree this manager reverts against
    #[inline]
    #[must_use]
    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    /// Ticket ids with a registered patch, in sorted order
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.registry.registered()
    }

    /// Whether a patch is registered for `ticket_id`
    #[inline]
    #[must_use]
    pub fn is_registered(&self, ticket_id: &str) -> bool {
        self.registry.contains(ticket_id)
    }

    /// Persist the forward diff for `ticket_id`; write-once
    ///
    /// The diff file (`<id>.patch`) is written before the registry entry so
    /// the registry never points at a missing patch.
    ///
    /// # Errors
    /// `RollbackError::AlreadyRegistered` if a patch already exists for the
    /// ticket — never a silent overwrite.
    pub fn register(&mut self, ticket_id: &str, forward_diff: &str) -> Result<(), RollbackError> {
        if self.registry.contains(ticket_id) {
            return Err(RollbackError::AlreadyRegistered(ticket_id.to_string()));
        }
        let file_name = format!("{ticket_id}.patch");
        fs::write(self.registry.dir().join(&file_name), forward_diff)?;
        self.registry.insert(ticket_id, &file_name)?;
        tracing::info!(ticket_id, file_name, "forward patch registered");
        Ok(())
    }

    /// Revert the patch registered for `ticket_id`
    ///
    /// Two-phase: dry-run check, then real apply. On success the registry
    /// entry is removed (the patch file stays on disk); a repeat call
    /// reports `NothingToRollBack`.
    ///
    /// # Errors
    /// `NothingToRollBack` if no patch is registered; `CheckFailed` /
    /// `ApplyFailed` with the tool diagnostic — the worktree is unchanged in
    /// either case.
    pub fn rollback(&mut self, ticket_id: &str) -> Result<(), RollbackError> {
        let patch_path = self
            .registry
            .patch_file(ticket_id)
            .ok_or_else(|| RollbackError::NothingToRollBack(ticket_id.to_string()))?;
        let diff = fs::read_to_string(&patch_path)?;

        self.apply_reverse(ticket_id, &diff, true)?;
        self.apply_reverse(ticket_id, &diff, false)?;

        self.registry.remove(ticket_id)?;
        tracing::info!(ticket_id, "patch rolled back");
        Ok(())
    }

    /// Drop the registry entry of a permanently accepted fix
    ///
    /// Idempotent; the patch file stays on disk.
    pub fn release(&mut self, ticket_id: &str) -> Result<(), RollbackError> {
        self.registry.remove(ticket_id)
    }

    fn apply_reverse(
        &self,
        ticket_id: &str,
        diff: &str,
        check_only: bool,
    ) -> Result<(), RollbackError> {
        let mut cmd = Command::new("git");
        cmd.arg("apply").arg("--reverse").arg("--whitespace=nowarn");
        if check_only {
            cmd.arg("--check");
        }
        cmd.current_dir(&self.worktree)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        // stdin was requested piped above
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(diff.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        if output.status.success() {
            return Ok(());
        }
        let diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if check_only {
            Err(RollbackError::CheckFailed {
                ticket_id: ticket_id.to_string(),
                diagnostic,
            })
        } else {
            Err(RollbackError::ApplyFailed {
                ticket_id: ticket_id.to_string(),
                diagnostic,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ORIGINAL: &str = "line one\nline two\nline three\n";
    const PATCHED: &str = "line one\nline two patched\nline three\n";
    const FORWARD_DIFF: &str = "\
--- a/app.txt
+++ b/app.txt
@@ -1,3 +1,3 @@
 line one
-line two
+line two patched
 line three
";

    struct Fixture {
        _patches: tempfile::TempDir,
        _worktree: tempfile::TempDir,
        manager: RollbackManager,
        file: PathBuf,
    }

    fn fixture() -> Fixture {
        let patches = tempfile::tempdir().unwrap();
        let worktree = tempfile::tempdir().unwrap();
        // git apply behaves best inside a repository
        let status = Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(worktree.path())
            .status()
            .unwrap();
        assert!(status.success());

        let file = worktree.path().join("app.txt");
        fs::write(&file, PATCHED).unwrap();

        let manager = RollbackManager::open(patches.path(), worktree.path()).unwrap();
        Fixture {
            _patches: patches,
            _worktree: worktree,
            manager,
            file,
        }
    }

    #[test]
    fn rollback_restores_pre_patch_state() {
        let mut fx = fixture();
        fx.manager.register("T1", FORWARD_DIFF).unwrap();
        assert!(fx.manager.is_registered("T1"));

        fx.manager.rollback("T1").unwrap();

        assert_eq!(fs::read_to_string(&fx.file).unwrap(), ORIGINAL);
        assert!(!fx.manager.is_registered("T1"));
    }

    #[test]
    fn repeated_rollback_reports_nothing_to_roll_back() {
        let mut fx = fixture();
        fx.manager.register("T1", FORWARD_DIFF).unwrap();
        fx.manager.rollback("T1").unwrap();

        let err = fx.manager.rollback("T1").unwrap_err();
        assert!(matches!(err, RollbackError::NothingToRollBack(id) if id == "T1"));
    }

    #[test]
    fn failed_dry_run_leaves_worktree_untouched() {
        let mut fx = fixture();
        fx.manager.register("T1", FORWARD_DIFF).unwrap();

        // Diverge the tree so the reverse diff no longer applies
        fs::write(&fx.file, "divergent content\n").unwrap();

        let err = fx.manager.rollback("T1").unwrap_err();
        assert!(matches!(err, RollbackError::CheckFailed { .. }));

        assert_eq!(fs::read_to_string(&fx.file).unwrap(), "divergent content\n");
        // Still registered: the rollback did not happen
        assert!(fx.manager.is_registered("T1"));
    }

    #[test]
    fn register_is_write_once() {
        let mut fx = fixture();
        fx.manager.register("T1", FORWARD_DIFF).unwrap();

        let err = fx.manager.register("T1", FORWARD_DIFF).unwrap_err();
        assert!(matches!(err, RollbackError::AlreadyRegistered(id) if id == "T1"));
    }

    #[test]
    fn release_drops_entry_for_accepted_fix() {
        let mut fx = fixture();
        fx.manager.register("T1", FORWARD_DIFF).unwrap();

        fx.manager.release("T1").unwrap();
        assert!(!fx.manager.is_registered("T1"));
        // Idempotent
        fx.manager.release("T1").unwrap();

        // The accepted patch stays applied
        assert_eq!(fs::read_to_string(&fx.file).unwrap(), PATCHED);
    }
}
