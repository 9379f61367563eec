//! Post-pipeline verification: running generated tests.
//!
//! The runner treats test execution as an opaque [`TestCapability`]. The
//! default implementation, [`SubprocessTestRunner`], runs each discovered
//! test file in a child process and parses its summary.

mod parser;
mod runner;

pub use parser::{parse_summary, TestSummary};
pub use runner::{SubprocessTestRunner, TestRunnerConfig};

use crate::core::{AggregateStatus, TestStatus};
use crate::errors::TestRunnerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runs the tests found in a workspace.
///
/// Finding no tests is not an error: return an aggregate with status
/// [`AggregateStatus::NoTests`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestCapability: Send + Sync {
    /// Discovers and runs tests under `workspace`.
    async fn run_tests(&self, workspace: &Path) -> Result<TestAggregate, TestRunnerError>;
}

/// Result of running one test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Path of the file relative to the workspace.
    pub file: String,
    /// Outcome of the file.
    pub status: TestStatus,
    /// Number of tests executed.
    pub tests_run: u32,
    /// Number of failed assertions.
    pub failures: u32,
    /// Number of tests that raised unexpectedly.
    pub errors: u32,
    /// Combined stdout and stderr.
    pub output: String,
}

impl TestOutcome {
    /// Tests that neither failed nor errored.
    #[must_use]
    pub fn passed(&self) -> u32 {
        self.tests_run
            .saturating_sub(self.failures)
            .saturating_sub(self.errors)
    }
}

/// Totals across every test file of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAggregate {
    /// Overall status.
    pub status: AggregateStatus,
    /// Sum of `tests_run`.
    pub total_tests: u32,
    /// Sum of passing tests.
    pub total_passed: u32,
    /// Sum of `failures`.
    pub total_failed: u32,
    /// Sum of `errors`.
    pub total_errors: u32,
    /// Per-file results in execution order.
    pub per_file: Vec<TestOutcome>,
    /// Why the capability failed, for [`AggregateStatus::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestAggregate {
    /// Combines per-file outcomes.
    #[must_use]
    pub fn from_outcomes(per_file: Vec<TestOutcome>) -> Self {
        let total_tests = per_file.iter().map(|o| o.tests_run).sum();
        let total_passed = per_file.iter().map(TestOutcome::passed).sum();
        let total_failed = per_file.iter().map(|o| o.failures).sum();
        let total_errors = per_file.iter().map(|o| o.errors).sum();

        let status = if per_file.is_empty() {
            AggregateStatus::NoTests
        } else if per_file.iter().all(|o| o.status == TestStatus::Passed) {
            AggregateStatus::Passed
        } else {
            AggregateStatus::Failed
        };

        Self {
            status,
            total_tests,
            total_passed,
            total_failed,
            total_errors,
            per_file,
            message: None,
        }
    }

    /// An aggregate with no files.
    #[must_use]
    pub fn no_tests() -> Self {
        Self::from_outcomes(Vec::new())
    }

    /// An aggregate describing a failed capability.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AggregateStatus::Error,
            total_tests: 0,
            total_passed: 0,
            total_failed: 0,
            total_errors: 0,
            per_file: Vec::new(),
            message: Some(message.into()),
        }
    }
}
