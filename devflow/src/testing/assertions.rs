//! Test assertions for workflow results.

use crate::core::StageId;
use crate::workflow::WorkflowResult;
use std::path::Path;

/// Asserts that the run succeeded.
pub fn assert_workflow_succeeded(result: &WorkflowResult) {
    assert!(
        result.is_success(),
        "Expected success, got status {} with error {:?}",
        result.status,
        result.error
    );
    assert!(result.error.is_none(), "Successful run carries an error: {:?}", result.error);
}

/// Asserts that the run failed with the given error category.
pub fn assert_workflow_failed(result: &WorkflowResult, category: &str) {
    assert!(!result.is_success(), "Expected failure, got success");
    let error = result.error.as_deref().unwrap_or_default();
    assert!(
        error.starts_with(&format!("{category}: ")),
        "Expected error category '{category}', got '{error}'"
    );
}

/// Asserts the order of speakers in the run's transcript.
pub fn assert_stage_sequence(result: &WorkflowResult, expected: &[StageId]) {
    let actual: Vec<StageId> = result.transcript.iter().map(|e| e.stage).collect();
    assert_eq!(actual, expected, "Unexpected stage sequence");
}

/// Asserts that `root/name` exists with exactly `content`.
pub fn assert_workspace_file(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    let actual = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Expected file {} to exist: {e}", path.display()));
    assert_eq!(actual, content, "Unexpected content in {}", path.display());
}
