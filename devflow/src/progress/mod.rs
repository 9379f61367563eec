//! One-way progress notifications for a presentation layer.
//!
//! The orchestrator fires one [`ProgressUpdate`] per transition. Sinks never
//! influence control flow: their errors and panics are logged and dropped.

mod sink;

pub use sink::{
    CollectingProgressSink, FnProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink,
};

use crate::core::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action label used when the producer is sent back for rework.
pub const REWORK_ACTION: &str = "fixing";

/// Action label used when the pipeline finishes.
pub const COMPLETE_ACTION: &str = "done";

/// A progress notification: which stage runs next and what it is doing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// The stage about to run, `None` once the pipeline is complete.
    pub stage: Option<StageId>,
    /// Short human-readable action label.
    pub action: String,
    /// Rework iteration, only set when looping back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

impl ProgressUpdate {
    /// Update for an ordinary hand-off to `stage`.
    #[must_use]
    pub fn stage(stage: StageId) -> Self {
        Self {
            stage: Some(stage),
            action: stage.action_label().to_string(),
            iteration: None,
        }
    }

    /// Update for a rework pass of `stage`.
    #[must_use]
    pub fn rework(stage: StageId, iteration: u32) -> Self {
        Self {
            stage: Some(stage),
            action: REWORK_ACTION.to_string(),
            iteration: Some(iteration),
        }
    }

    /// Update signalling completion.
    #[must_use]
    pub fn complete() -> Self {
        Self {
            stage: None,
            action: COMPLETE_ACTION.to_string(),
            iteration: None,
        }
    }

    /// Returns true for the completion update.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stage.is_none()
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.stage, self.iteration) {
            (Some(stage), Some(iteration)) => {
                write!(f, "{stage}: {} (iteration {iteration})", self.action)
            }
            (Some(stage), None) => write!(f, "{stage}: {}", self.action),
            (None, _) => f.write_str(&self.action),
        }
    }
}
