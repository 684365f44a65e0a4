//! Child-process execution with forced timeout
//!
//! Output is captured regardless of outcome. A command that exceeds its
//! timeout is reported as timed out even if it would eventually have exited
//! zero; the kill is best-effort and tolerates a child that exits between
//! timeout-fire and kill-delivery.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Classification of a verification run; exactly one applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Command exited zero — the only path to acceptance
    Passed,
    /// Command exited nonzero
    Failed,
    /// Wall-clock timeout elapsed before completion
    TimedOut,
    /// The verification command does not exist
    CommandNotFound,
    /// Spawn or wait failed for some other reason
    Error,
}

/// Outcome of one verification run
#[derive(Debug, Clone)]
pub struct CanaryResult {
    /// What happened
    pub status: VerifyStatus,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Diagnostic for non-exit outcomes (timeout, spawn failure, exit code)
    pub error: Option<String>,
}

impl CanaryResult {
    /// Whether the verification passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == VerifyStatus::Passed
    }

    /// Whether the run hit the wall-clock timeout
    #[inline]
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.status == VerifyStatus::TimedOut
    }

    fn immediate(status: VerifyStatus, error: String) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
        }
    }
}

/// Runs a verification command with a hard wall-clock timeout
#[derive(Debug, Clone)]
pub struct CanaryRunner {
    timeout: Duration,
}

impl CanaryRunner {
    /// Create a runner with the given timeout
    #[inline]
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program` with `args`, capturing output until exit or timeout
    pub async fn run(&self, program: &str, args: &[String]) -> CanaryResult {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return CanaryResult::immediate(
                    VerifyStatus::CommandNotFound,
                    format!("command not found: {program}"),
                );
            }
            Err(e) => {
                return CanaryResult::immediate(
                    VerifyStatus::Error,
                    format!("failed to spawn {program}: {e}"),
                );
            }
        };

        // Drain both pipes concurrently so a chatty child cannot block on a
        // full pipe while we wait on it
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let (status, error) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Err(_elapsed) => {
                // The child may exit between timeout-fire and kill-delivery;
                // either way the run is a timeout
                let _ = child.kill().await;
                let _ = child.wait().await;
                tracing::warn!(program, timeout_ms = self.timeout.as_millis() as u64, "verification timed out");
                (
                    VerifyStatus::TimedOut,
                    Some(format!("timed out after {:?}", self.timeout)),
                )
            }
            Ok(Ok(exit)) => {
                if exit.success() {
                    (VerifyStatus::Passed, None)
                } else {
                    (
                        VerifyStatus::Failed,
                        Some(match exit.code() {
                            Some(code) => format!("exit code {code}"),
                            None => "terminated by signal".to_string(),
                        }),
                    )
                }
            }
            Ok(Err(e)) => (
                VerifyStatus::Error,
                Some(format!("wait failed for {program}: {e}")),
            ),
        };

        let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

        CanaryResult {
            status,
            stdout,
            stderr,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn zero_exit_passes_with_captured_stdout() {
        let runner = CanaryRunner::new(Duration::from_secs(10));
        let result = runner.run("sh", &sh("echo all good")).await;

        assert_eq!(result.status, VerifyStatus::Passed);
        assert!(result.passed());
        assert!(result.stdout.contains("all good"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_captured_stderr() {
        let runner = CanaryRunner::new(Duration::from_secs(10));
        let result = runner.run("sh", &sh("echo broken 1>&2; exit 3")).await;

        assert_eq!(result.status, VerifyStatus::Failed);
        assert!(!result.passed());
        assert!(result.stderr.contains("broken"));
        assert_eq!(result.error.as_deref(), Some("exit code 3"));
    }

    #[tokio::test]
    async fn timeout_takes_precedence_over_late_zero_exit() {
        let runner = CanaryRunner::new(Duration::from_millis(100));
        // Would exit zero, but only after the timeout
        let result = runner.run("sh", &sh("sleep 5; exit 0")).await;

        assert_eq!(result.status, VerifyStatus::TimedOut);
        assert!(result.timed_out());
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn missing_command_is_classified() {
        let runner = CanaryRunner::new(Duration::from_secs(1));
        let result = runner
            .run("medic-no-such-binary-a1b2c3", &[])
            .await;

        assert_eq!(result.status, VerifyStatus::CommandNotFound);
        assert!(result.error.as_deref().unwrap_or("").contains("not found"));
    }

    #[tokio::test]
    async fn output_captured_before_timeout() {
        let runner = CanaryRunner::new(Duration::from_millis(300));
        let result = runner.run("sh", &sh("echo early; sleep 5")).await;

        assert_eq!(result.status, VerifyStatus::TimedOut);
        assert!(result.stdout.contains("early"));
    }
}
