//! Mock collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{StageId, Transcript};
use crate::errors::{StageError, TestRunnerError};
use crate::stages::StageInvoker;
use crate::verification::{TestAggregate, TestCapability};

/// An invoker answering from per-stage scripts.
///
/// Each stage replays its script in order and then repeats the last entry.
/// Stages without a script answer `"<stage> output"`.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    scripts: HashMap<StageId, Vec<String>>,
    failures: HashMap<StageId, StageError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<StageId>>,
}

impl ScriptedInvoker {
    /// Creates an invoker with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `stage` always answer `content`.
    #[must_use]
    pub fn with_response(self, stage: StageId, content: impl Into<String>) -> Self {
        self.with_responses(stage, [content.into()])
    }

    /// Makes `stage` answer each item of `contents` in turn.
    #[must_use]
    pub fn with_responses<I, S>(mut self, stage: StageId, contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .insert(stage, contents.into_iter().map(Into::into).collect());
        self
    }

    /// Makes `stage` fail with `error`.
    #[must_use]
    pub fn with_failure(mut self, stage: StageId, error: StageError) -> Self {
        self.failures.insert(stage, error);
        self
    }

    /// Sleeps before every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stages invoked so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StageId> {
        self.calls.lock().clone()
    }

    /// Number of invocations of `stage`.
    #[must_use]
    pub fn call_count(&self, stage: StageId) -> usize {
        self.calls.lock().iter().filter(|s| **s == stage).count()
    }

    fn next_response(&self, stage: StageId) -> Result<String, StageError> {
        let previous = {
            let mut calls = self.calls.lock();
            let previous = calls.iter().filter(|s| **s == stage).count();
            calls.push(stage);
            previous
        };

        if let Some(error) = self.failures.get(&stage) {
            return Err(error.clone());
        }

        Ok(match self.scripts.get(&stage) {
            Some(script) if !script.is_empty() => {
                script[previous.min(script.len() - 1)].clone()
            }
            _ => format!("{stage} output"),
        })
    }
}

#[async_trait]
impl StageInvoker for ScriptedInvoker {
    async fn invoke(&self, stage: StageId, _transcript: &Transcript) -> Result<String, StageError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response(stage)
    }
}

/// An invoker that fails every call.
#[derive(Debug, Clone)]
pub struct FailingInvoker {
    error: StageError,
}

impl FailingInvoker {
    /// Creates an invoker failing with `error`.
    #[must_use]
    pub fn new(error: StageError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl StageInvoker for FailingInvoker {
    async fn invoke(&self, _stage: StageId, _transcript: &Transcript) -> Result<String, StageError> {
        Err(self.error.clone())
    }
}

/// A test capability returning a fixed aggregate.
#[derive(Debug)]
pub struct StaticTestCapability {
    aggregate: TestAggregate,
    workspaces: Mutex<Vec<PathBuf>>,
}

impl StaticTestCapability {
    /// Creates a capability returning `aggregate`.
    #[must_use]
    pub fn new(aggregate: TestAggregate) -> Self {
        Self {
            aggregate,
            workspaces: Mutex::new(Vec::new()),
        }
    }

    /// Workspaces the capability was asked to test.
    #[must_use]
    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.workspaces.lock().clone()
    }
}

#[async_trait]
impl TestCapability for StaticTestCapability {
    async fn run_tests(&self, workspace: &Path) -> Result<TestAggregate, TestRunnerError> {
        self.workspaces.lock().push(workspace.to_path_buf());
        Ok(self.aggregate.clone())
    }
}

/// A test capability whose infrastructure always fails.
#[derive(Debug, Clone)]
pub struct FailingTestCapability {
    message: String,
}

impl FailingTestCapability {
    /// Creates a capability failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl TestCapability for FailingTestCapability {
    async fn run_tests(&self, _workspace: &Path) -> Result<TestAggregate, TestRunnerError> {
        Err(TestRunnerError::Failed(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AggregateStatus;

    #[tokio::test]
    async fn test_scripted_invoker_replays_then_repeats() {
        let invoker = ScriptedInvoker::new().with_responses(StageId::Review, ["FIX_REQUIRED", "APPROVED"]);
        let t = Transcript::new();

        assert_eq!(invoker.invoke(StageId::Review, &t).await.unwrap(), "FIX_REQUIRED");
        assert_eq!(invoker.invoke(StageId::Review, &t).await.unwrap(), "APPROVED");
        assert_eq!(invoker.invoke(StageId::Review, &t).await.unwrap(), "APPROVED");
        assert_eq!(invoker.invoke(StageId::Delivery, &t).await.unwrap(), "delivery output");
        assert_eq!(invoker.call_count(StageId::Review), 3);
        assert_eq!(invoker.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_scripted_invoker_failure() {
        let invoker = ScriptedInvoker::new().with_failure(StageId::Requirements, StageError::quota("limit"));
        let err = invoker.invoke(StageId::Requirements, &Transcript::new()).await.unwrap_err();
        assert_eq!(err, StageError::quota("limit"));
        assert_eq!(invoker.call_count(StageId::Requirements), 1);
    }

    #[tokio::test]
    async fn test_failing_invoker() {
        let invoker = FailingInvoker::new(StageError::network("offline"));
        assert!(invoker.invoke(StageId::Review, &Transcript::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_static_capability_records_workspace() {
        let capability = StaticTestCapability::new(TestAggregate::no_tests());
        let aggregate = capability.run_tests(Path::new("ws")).await.unwrap();
        assert_eq!(aggregate.status, AggregateStatus::NoTests);
        assert_eq!(capability.workspaces(), vec![PathBuf::from("ws")]);
    }

    #[test]
    fn test_failing_capability_blocking() {
        let capability = FailingTestCapability::new("no interpreter");
        let err = tokio_test::block_on(capability.run_tests(Path::new("ws"))).unwrap_err();
        assert_eq!(err.to_string(), "no interpreter");
    }
}
