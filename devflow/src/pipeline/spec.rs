//! Pipeline specification: stage order and the revision loop.

use crate::core::StageId;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The producer/reviewer pair forming the pipeline's revision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewLoop {
    /// The stage sent back for rework.
    pub producer: StageId,
    /// The stage deciding between rework and approval.
    pub reviewer: StageId,
}

impl ReviewLoop {
    /// Creates a review loop.
    #[must_use]
    pub fn new(producer: StageId, reviewer: StageId) -> Self {
        Self { producer, reviewer }
    }
}

/// Ordered content stages plus an optional revision loop.
///
/// [`StageId::Start`] is implicit and never listed. When a loop is present
/// the reviewer must directly follow the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    stages: Vec<StageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    review_loop: Option<ReviewLoop>,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self::standard()
    }
}

impl PipelineSpec {
    /// Creates a linear pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if `stages` is empty, lists the start stage, or
    /// contains duplicates.
    pub fn linear(stages: impl IntoIterator<Item = StageId>) -> Result<Self, ConfigError> {
        let spec = Self {
            stages: stages.into_iter().collect(),
            review_loop: None,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// The seven-stage pipeline with an implementation/review loop.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            stages: vec![
                StageId::Requirements,
                StageId::Implementation,
                StageId::Review,
                StageId::Documentation,
                StageId::Verification,
                StageId::Delivery,
                StageId::Interface,
            ],
            review_loop: Some(ReviewLoop::new(StageId::Implementation, StageId::Review)),
        }
    }

    /// Adds a revision loop.
    ///
    /// # Errors
    ///
    /// Returns an error if either stage is missing or the reviewer does not
    /// directly follow the producer.
    pub fn with_review_loop(mut self, producer: StageId, reviewer: StageId) -> Result<Self, ConfigError> {
        self.review_loop = Some(ReviewLoop::new(producer, reviewer));
        self.validate()?;
        Ok(self)
    }

    /// Content stages in order.
    #[must_use]
    pub fn stages(&self) -> &[StageId] {
        &self.stages
    }

    /// The revision loop, if any.
    #[must_use]
    pub fn review_loop(&self) -> Option<ReviewLoop> {
        self.review_loop
    }

    /// The first content stage.
    #[must_use]
    pub fn first(&self) -> Option<StageId> {
        self.stages.first().copied()
    }

    /// The final content stage.
    #[must_use]
    pub fn last(&self) -> Option<StageId> {
        self.stages.last().copied()
    }

    /// The stage following `stage` in pipeline order.
    #[must_use]
    pub fn successor(&self, stage: StageId) -> Option<StageId> {
        let index = self.position(stage)?;
        self.stages.get(index + 1).copied()
    }

    /// Returns true if `stage` is part of the pipeline.
    #[must_use]
    pub fn contains(&self, stage: StageId) -> bool {
        self.stages.contains(&stage)
    }

    fn position(&self, stage: StageId) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage)
    }

    /// Validates the specification.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPipeline`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::InvalidPipeline(
                "pipeline must contain at least one stage".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.is_start() {
                return Err(ConfigError::InvalidPipeline(
                    "the start stage is implicit and cannot be listed".to_string(),
                ));
            }
            if !seen.insert(*stage) {
                return Err(ConfigError::InvalidPipeline(format!(
                    "stage '{stage}' appears more than once"
                )));
            }
        }

        if let Some(review_loop) = self.review_loop {
            let producer = self.position(review_loop.producer).ok_or_else(|| {
                ConfigError::InvalidPipeline(format!(
                    "review loop producer '{}' is not in the pipeline",
                    review_loop.producer
                ))
            })?;
            let reviewer = self.position(review_loop.reviewer).ok_or_else(|| {
                ConfigError::InvalidPipeline(format!(
                    "review loop reviewer '{}' is not in the pipeline",
                    review_loop.reviewer
                ))
            })?;
            if reviewer != producer + 1 {
                return Err(ConfigError::InvalidPipeline(format!(
                    "reviewer '{}' must directly follow producer '{}'",
                    review_loop.reviewer, review_loop.producer
                )));
            }
        }

        Ok(())
    }
}
