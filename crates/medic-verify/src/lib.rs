//! Verification runners for candidate fixes
//!
//! [`CanaryRunner`] executes a verification command as a child process under
//! a hard wall-clock timeout, always producing a well-typed [`CanaryResult`]
//! rather than an uncaught fault. [`SmokeRunner`] wraps it for the external
//! smoke-test command and compresses oversized failure logs to a bounded
//! token budget.

#![warn(unreachable_pub)]

mod runner;
mod smoke;

pub use runner::{CanaryResult, CanaryRunner, VerifyStatus};
pub use smoke::{compress_log, SmokeOutcome, SmokeRunner};
