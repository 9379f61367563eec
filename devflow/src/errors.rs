//! Error types for the devflow orchestrator.
//!
//! Only two families of failure ever reach a caller as an error result:
//! rejected input and collaborator failures. Extraction problems, ambiguous
//! review verdicts and runaway loops are recovered in place and reported
//! through logs and the [`crate::workflow::WorkflowResult`] record instead.

use crate::core::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Run-level error raised while driving a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The request was rejected before any stage ran.
    #[error("{0}")]
    InvalidRequest(String),

    /// A stage invocation failed.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        /// The stage that was being invoked.
        stage: StageId,
        /// The collaborator error.
        #[source]
        source: StageError,
    },

    /// The run was cancelled from outside.
    #[error("workflow was interrupted: {0}")]
    Cancelled(String),

    /// The configuration handed to the runner is unusable.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl WorkflowError {
    /// Creates a stage failure.
    #[must_use]
    pub fn stage(stage: StageId, source: StageError) -> Self {
        Self::Stage { stage, source }
    }

    /// Returns the category label recorded in a failed result.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::Stage { source, .. } => source.kind.category(),
            Self::Cancelled(_) => "Cancelled",
            Self::Configuration(_) => "ConfigurationError",
        }
    }

    /// Formats the error as `<Category>: <message>`.
    #[must_use]
    pub fn to_result_message(&self) -> String {
        format!("{}: {}", self.category(), self)
    }
}

/// Broad classification of stage invocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Credentials were rejected.
    Authentication,
    /// A rate limit or quota was exhausted.
    Quota,
    /// The collaborator timed out.
    Timeout,
    /// The collaborator could not be reached.
    Network,
    /// The collaborator answered with something unusable.
    InvalidResponse,
    /// The invocation panicked.
    Panic,
    /// Anything else.
    Other,
}

impl StageErrorKind {
    /// Returns the category label for this kind.
    #[must_use]
    pub fn category(self) -> &'static str {
        match self {
            Self::Authentication => "AuthenticationError",
            Self::Quota => "QuotaExceeded",
            Self::Timeout => "TimeoutError",
            Self::Network => "ConnectionError",
            Self::InvalidResponse => "InvalidResponse",
            Self::Panic => "Panic",
            Self::Other => "StageError",
        }
    }
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Error returned by a [`crate::stages::StageInvoker`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StageError {
    /// The failure category.
    pub kind: StageErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl StageError {
    /// Creates a stage error.
    #[must_use]
    pub fn new(kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Authentication, message)
    }

    /// Creates a quota error.
    #[must_use]
    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Quota, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Timeout, message)
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Network, message)
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::InvalidResponse, message)
    }

    /// Creates an uncategorized error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Other, message)
    }

    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::new(StageErrorKind::Panic, panic_message(payload))
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(format!("{err:#}"))
    }
}

/// Errors raised by a [`crate::verification::TestCapability`].
#[derive(Debug, Error)]
pub enum TestRunnerError {
    /// The workspace directory does not exist.
    #[error("workspace not found: {}", path.display())]
    WorkspaceMissing {
        /// The missing path.
        path: PathBuf,
    },

    /// Walking the workspace failed.
    #[error("failed to scan {}: {source}", path.display())]
    Discovery {
        /// The directory being scanned.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any other infrastructure failure.
    #[error("{0}")]
    Failed(String),
}

/// Configuration validation and parsing errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The pipeline definition is inconsistent.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A scalar setting is out of range.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The delimiter tokens cannot form a scanner.
    #[error("invalid delimiter configuration: {0}")]
    InvalidDelimiter(String),

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Error reported by a progress sink. Always swallowed by the orchestrator.
#[derive(Debug, Clone, Error)]
#[error("progress sink failed: {0}")]
pub struct ProgressError(pub String);

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be opened.
    #[error("failed to open log file {}: {source}", path.display())]
    LogFile {
        /// The log file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed or the filter is invalid.
    #[error("failed to initialize tracing: {0}")]
    Init(String),
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
