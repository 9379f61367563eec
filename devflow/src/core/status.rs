//! Status enums for runs and test outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// The pipeline reached a terminal state.
    Success,
    /// The request was rejected or a collaborator failed.
    Error,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl WorkflowStatus {
    /// Returns true for [`WorkflowStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of running a single test file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Every test in the file passed.
    Passed,
    /// At least one test failed or errored.
    Failed,
    /// The file exceeded its time budget.
    Timeout,
    /// The file could not be run or its result could not be read.
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Combined outcome of a verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    /// Every discovered file passed.
    Passed,
    /// At least one file did not pass.
    Failed,
    /// No test files were discovered.
    NoTests,
    /// The test capability itself failed.
    Error,
}

impl fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::NoTests => write!(f, "no_tests"),
            Self::Error => write!(f, "error"),
        }
    }
}
