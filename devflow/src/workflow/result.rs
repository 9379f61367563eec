//! The record returned by a workflow run.

use crate::core::{TranscriptEntry, WorkflowStatus};
use crate::extract::ExtractionFailure;
use crate::pipeline::TerminalReason;
use crate::utils::Timestamp;
use crate::verification::TestAggregate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one run. Built once when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Unique id of the run, also recorded on the `workflow` span.
    pub run_id: Uuid,
    /// Whether the pipeline reached a terminal state.
    pub status: WorkflowStatus,
    /// Transcript length, including the request.
    pub total_messages: usize,
    /// Revision counter at the end of the run.
    pub revision_iterations: u32,
    /// Distinct artifacts written to the workspace.
    pub artifacts_extracted: usize,
    /// Names of the written artifacts, sorted.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Blocks that were skipped or could not be written.
    #[serde(default)]
    pub extraction_failures: Vec<ExtractionFailure>,
    /// Verification results, when a test capability ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_outcome: Option<TestAggregate>,
    /// `<Category>: <message>` for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the orchestrator stopped, for runs that got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminalReason>,
    /// Every message of the run.
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run ended.
    pub finished_at: Timestamp,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl WorkflowResult {
    /// Returns true for a successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serializes the result as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
