//! Workflow configuration.
//!
//! Every field has a serde default, so a partial JSON document (or `{}`)
//! yields a usable configuration.

use crate::errors::ConfigError;
use crate::extract::DelimiterConfig;
use crate::pipeline::{
    AmbiguousReviewPolicy, PipelineSpec, ReviewMarkers, DEFAULT_MAX_ROUNDS,
    DEFAULT_REVISION_CEILING,
};
use crate::verification::TestRunnerConfig;
use crate::workflow::RequestLimits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for a [`crate::workflow::WorkflowRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Stage order and revision loop.
    #[serde(default)]
    pub pipeline: PipelineSpec,
    /// Rework rounds allowed before the loop is forced open.
    #[serde(default = "default_revision_ceiling")]
    pub revision_ceiling: u32,
    /// Cap on stage invocations per run.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Treatment of reviews without a marker.
    #[serde(default)]
    pub ambiguous_review: AmbiguousReviewPolicy,
    /// Review marker tokens.
    #[serde(default)]
    pub markers: ReviewMarkers,
    /// File block delimiters.
    #[serde(default)]
    pub delimiters: DelimiterConfig,
    /// Directory artifacts are written to.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Request bounds.
    #[serde(default)]
    pub request_limits: RequestLimits,
    /// Settings for the default test runner.
    #[serde(default)]
    pub test_runner: TestRunnerConfig,
}

fn default_revision_ceiling() -> u32 {
    DEFAULT_REVISION_CEILING
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("workspace")
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSpec::default(),
            revision_ceiling: default_revision_ceiling(),
            max_rounds: default_max_rounds(),
            ambiguous_review: AmbiguousReviewPolicy::default(),
            markers: ReviewMarkers::default(),
            delimiters: DelimiterConfig::default(),
            workspace_dir: default_workspace_dir(),
            request_limits: RequestLimits::default(),
            test_runner: TestRunnerConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and a validation
    /// error for inconsistent values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineSpec) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Sets the rework ceiling.
    #[must_use]
    pub fn with_revision_ceiling(mut self, ceiling: u32) -> Self {
        self.revision_ceiling = ceiling;
        self
    }

    /// Sets the round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the ambiguous review policy.
    #[must_use]
    pub fn with_ambiguous_review(mut self, policy: AmbiguousReviewPolicy) -> Self {
        self.ambiguous_review = policy;
        self
    }

    /// Sets the review markers.
    #[must_use]
    pub fn with_markers(mut self, markers: ReviewMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Sets the block delimiters.
    #[must_use]
    pub fn with_delimiters(mut self, delimiters: DelimiterConfig) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Sets the workspace directory.
    #[must_use]
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    /// Sets the request bounds.
    #[must_use]
    pub fn with_request_limits(mut self, limits: RequestLimits) -> Self {
        self.request_limits = limits;
        self
    }

    /// Sets the test runner settings.
    #[must_use]
    pub fn with_test_runner(mut self, test_runner: TestRunnerConfig) -> Self {
        self.test_runner = test_runner;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.revision_ceiling == 0 {
            return Err(ConfigError::invalid_value("revision_ceiling", "must be at least 1"));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::invalid_value("max_rounds", "must be at least 1"));
        }
        if self.workspace_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value("workspace_dir", "must not be empty"));
        }
        self.markers.validate()?;
        self.delimiters.validate()?;
        self.request_limits.validate()?;
        self.test_runner.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.revision_ceiling, 5);
        assert_eq!(config.max_rounds, 50);
        assert_eq!(config.workspace_dir, PathBuf::from("workspace"));
        assert_eq!(config.request_limits.max_chars, 5000);
        assert_eq!(config.ambiguous_review, AmbiguousReviewPolicy::FailOpen);
        assert_eq!(config.pipeline, PipelineSpec::standard());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(WorkflowConfig::from_json_str("{}").unwrap(), WorkflowConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = WorkflowConfig::from_json_str(
            r#"{
                "revision_ceiling": 2,
                "ambiguous_review": "fail_closed",
                "pipeline": {"stages": ["requirements", "implementation", "review"],
                             "review_loop": {"producer": "implementation", "reviewer": "review"}},
                "test_runner": {"timeout_seconds": 10}
            }"#,
        )
        .unwrap();

        assert_eq!(config.revision_ceiling, 2);
        assert_eq!(config.ambiguous_review, AmbiguousReviewPolicy::FailClosed);
        assert_eq!(config.pipeline.last(), Some(StageId::Review));
        assert_eq!(config.test_runner.timeout_seconds, 10);
        assert_eq!(config.test_runner.interpreter, "python3");
        assert_eq!(config.markers, ReviewMarkers::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(WorkflowConfig::default().with_revision_ceiling(0).validate().is_err());
        assert!(WorkflowConfig::default().with_max_rounds(0).validate().is_err());
        assert!(WorkflowConfig::default().with_workspace_dir("").validate().is_err());
        assert!(WorkflowConfig::from_json_str(r#"{"pipeline": {"stages": []}}"#).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = WorkflowConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
