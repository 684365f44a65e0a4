//! Smoke-test invocation with bounded failure logs
//!
//! The smoke command is an external collaborator executed in an isolated
//! environment; inputs are a project identifier, a service identifier, a
//! test path, optional extra arguments, and a token budget. A failure log is
//! compressed head+tail to the budget so diagnostics never grow unbounded.

use crate::runner::{CanaryRunner, CanaryResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Approximate characters per token used for log budgeting
const CHARS_PER_TOKEN: usize = 4;

/// Result of a smoke run, serializable as `{"success": bool, "log": str}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeOutcome {
    /// Whether the smoke command exited zero
    pub success: bool,
    /// Captured (possibly compressed) log text
    pub log: String,
}

/// Runs the external smoke-test command
#[derive(Debug, Clone)]
pub struct SmokeRunner {
    program: String,
    runner: CanaryRunner,
    token_budget: usize,
}

impl SmokeRunner {
    /// Create a smoke runner for `program` with a timeout and token budget
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration, token_budget: usize) -> Self {
        Self {
            program: program.into(),
            runner: CanaryRunner::new(timeout),
            token_budget,
        }
    }

    /// Invoke the smoke command for one project/service/test triple
    pub async fn run(
        &self,
        project: &str,
        service: &str,
        test_path: &str,
        extra_args: &[String],
    ) -> SmokeOutcome {
        let mut args = vec![
            "--project".to_string(),
            project.to_string(),
            "--service".to_string(),
            service.to_string(),
            test_path.to_string(),
        ];
        args.extend_from_slice(extra_args);

        let result = self.runner.run(&self.program, &args).await;
        let success = result.passed();
        let mut log = combine_output(&result);
        if !success {
            log = compress_log(&log, self.token_budget);
        }
        SmokeOutcome { success, log }
    }
}

fn combine_output(result: &CanaryResult) -> String {
    let mut log = String::new();
    if !result.stdout.is_empty() {
        log.push_str(&result.stdout);
    }
    if !result.stderr.is_empty() {
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&result.stderr);
    }
    if let Some(error) = &result.error {
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(error);
    }
    log
}

/// Compress `log` to roughly `token_budget` tokens, keeping head and tail
///
/// Logs within budget are returned unchanged. The middle is replaced with an
/// elision marker; the failure signature at the end of a test log survives.
#[must_use]
pub fn compress_log(log: &str, token_budget: usize) -> String {
    let max_chars = token_budget.saturating_mul(CHARS_PER_TOKEN);
    if log.len() <= max_chars {
        return log.to_string();
    }

    let head_target = max_chars / 2;
    let tail_target = max_chars - head_target;

    let mut head_end = head_target.min(log.len());
    while head_end > 0 && !log.is_char_boundary(head_end) {
        head_end -= 1;
    }
    let mut tail_start = log.len().saturating_sub(tail_target);
    while tail_start < log.len() && !log.is_char_boundary(tail_start) {
        tail_start += 1;
    }

    let elided = tail_start.saturating_sub(head_end);
    format!(
        "{}\n... [{} chars elided] ...\n{}",
        &log[..head_end],
        elided,
        &log[tail_start..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn small_log_is_unchanged() {
        let log = "12 tests passed\n";
        assert_eq!(compress_log(log, 100), log);
    }

    #[test]
    fn oversized_log_is_bounded_and_keeps_both_ends() {
        let log = format!("HEAD-MARKER\n{}\nTAIL-MARKER", "x".repeat(100_000));
        let compressed = compress_log(&log, 50);

        assert!(compressed.len() < log.len());
        // Budget plus the elision marker line
        assert!(compressed.len() <= 50 * CHARS_PER_TOKEN + 64);
        assert!(compressed.starts_with("HEAD-MARKER"));
        assert!(compressed.ends_with("TAIL-MARKER"));
        assert!(compressed.contains("chars elided"));
    }

    #[test]
    fn zero_budget_collapses_to_marker() {
        let compressed = compress_log("some long failure output", 0);
        assert!(compressed.contains("chars elided"));
    }

    #[test]
    fn outcome_serializes_to_expected_envelope() {
        let outcome = SmokeOutcome {
            success: false,
            log: "boom".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"success":false,"log":"boom"}"#);
    }

    #[tokio::test]
    async fn failing_smoke_run_compresses_log() {
        let runner = SmokeRunner::new("sh", std::time::Duration::from_secs(10), 10);
        // `sh --project ...` fails immediately with a usage error; enough to
        // exercise the failure path
        let outcome = runner.run("proj", "svc", "tests/smoke", &[]).await;

        assert!(!outcome.success);
        assert!(outcome.log.len() <= 10 * CHARS_PER_TOKEN + 64);
    }

    #[tokio::test]
    async fn passing_smoke_run_reports_success() {
        // `true` ignores its arguments and exits zero
        let runner = SmokeRunner::new("true", std::time::Duration::from_secs(10), 100);
        let outcome = runner.run("proj", "svc", "tests/smoke", &[]).await;

        assert!(outcome.success);
    }
}
