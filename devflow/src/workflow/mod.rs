//! The workflow runner: request in, [`WorkflowResult`] out.
//!
//! A run validates the request, drives a fresh [`Orchestrator`] to a terminal
//! state, extracts artifacts into the workspace and runs the generated tests.
//! Only the configuration and the collaborators are shared between runs.

mod request;
mod result;


pub use request::{validate_request, RequestLimits};
pub use result::WorkflowResult;

use crate::cancellation::CancellationToken;
use crate::config::WorkflowConfig;
use crate::core::{Transcript, WorkflowStatus};
use crate::errors::{panic_message, ConfigError, WorkflowError};
use crate::extract::{ArtifactExtractor, Extraction, ExtractionFailure, Workspace};
use crate::pipeline::{Orchestrator, TransitionTable};
use crate::progress::{NoOpProgressSink, ProgressSink};
use crate::stages::StageInvoker;
use crate::utils::{elapsed_ms, now_utc, preview, Timestamp};
use crate::verification::{SubprocessTestRunner, TestAggregate, TestCapability};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const REQUEST_PREVIEW_CHARS: usize = 100;

/// Runs workflows against a fixed configuration and set of collaborators.
pub struct WorkflowRunner {
    config: WorkflowConfig,
    table: Arc<TransitionTable>,
    extractor: ArtifactExtractor,
    workspace: Workspace,
    invoker: Arc<dyn StageInvoker>,
    tests: Option<Arc<dyn TestCapability>>,
    progress: Arc<dyn ProgressSink>,
    cancel: Arc<CancellationToken>,
}

impl WorkflowRunner {
    /// Creates a runner.
    ///
    /// Generated tests run through a [`SubprocessTestRunner`] built from
    /// `config.test_runner`. No progress sink is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: WorkflowConfig, invoker: Arc<dyn StageInvoker>) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = ArtifactExtractor::new(&config.delimiters)?;
        let tests: Arc<dyn TestCapability> =
            Arc::new(SubprocessTestRunner::new(config.test_runner.clone()));
        Ok(Self {
            table: Arc::new(TransitionTable::from_config(&config)),
            workspace: Workspace::new(config.workspace_dir.clone()),
            extractor,
            config,
            invoker,
            tests: Some(tests),
            progress: Arc::new(NoOpProgressSink),
            cancel: Arc::new(CancellationToken::new()),
        })
    }

    /// Replaces the test capability run after extraction.
    #[must_use]
    pub fn with_test_capability(mut self, tests: Arc<dyn TestCapability>) -> Self {
        self.tests = Some(tests);
        self
    }

    /// Skips verification. Results then carry no `test_outcome`.
    #[must_use]
    pub fn without_test_capability(mut self) -> Self {
        self.tests = None;
        self
    }

    /// Attaches a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Uses a caller-provided cancellation token.
    ///
    /// Cancelling stops the runs in flight. Each new run clears a previous
    /// cancellation before it starts.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token that cancels runs of this runner.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancel)
    }

    /// The runner's configuration.
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// The workspace artifacts are written to.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Runs one workflow. Never fails: problems are reported in the result.
    pub async fn run(&self, request: &str) -> WorkflowResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("workflow", %run_id);
        self.execute(run_id, request).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, request: &str) -> WorkflowResult {
        let started = RunClock::start(run_id);
        self.cancel.reset();

        let request = match validate_request(request, self.config.request_limits) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected request: {}", e);
                return started.failed(&e, Transcript::new(), 0);
            }
        };
        info!(
            chars = request.chars().count(),
            request = %preview(request, REQUEST_PREVIEW_CHARS),
            "Workflow started"
        );

        let mut orchestrator = Orchestrator::new(Arc::clone(&self.table))
            .with_max_rounds(self.config.max_rounds)
            .with_progress(Arc::clone(&self.progress));

        let termination = match orchestrator.run(request, self.invoker.as_ref(), &self.cancel).await {
            Ok(reason) => reason,
            Err(e) => {
                error!(category = e.category(), "Workflow failed: {}", e);
                let iterations = orchestrator.revision_iterations();
                return started.failed(&e, orchestrator.into_transcript(), iterations);
            }
        };
        let iterations = orchestrator.revision_iterations();
        let transcript = orchestrator.into_transcript();

        let extraction = self.extractor.extract(&transcript);
        if extraction.is_empty() {
            warn!("No files were extracted from stage output");
            let fenced = self.extractor.fenced_without_blocks(&transcript);
            if !fenced.is_empty() {
                debug!(messages = ?fenced, "Messages with fenced code but no file blocks");
            }
        }
        let (written, extraction_failures) = self.persist(&extraction).await;
        info!(count = written.len(), root = %self.workspace.root().display(), "Extracted files");

        let test_outcome = match self.verify().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Workflow cancelled during verification");
                return started.failed(&e, transcript, iterations);
            }
        };

        let result = WorkflowResult {
            run_id,
            status: WorkflowStatus::Success,
            total_messages: transcript.len(),
            revision_iterations: iterations,
            artifacts_extracted: written.len(),
            artifacts: written,
            extraction_failures,
            test_outcome,
            error: None,
            termination: Some(termination),
            transcript: transcript.into_entries(),
            started_at: started.at,
            finished_at: now_utc(),
            duration_ms: elapsed_ms(started.clock),
        };
        info!(
            messages = result.total_messages,
            iterations = result.revision_iterations,
            artifacts = result.artifacts_extracted,
            termination = %termination,
            duration_ms = result.duration_ms,
            "Workflow completed"
        );
        result
    }

    async fn persist(&self, extraction: &Extraction) -> (Vec<String>, Vec<ExtractionFailure>) {
        let mut failures = extraction.failures.clone();
        let (written, write_failures) = self.workspace.write_all(&extraction.artifacts).await;
        failures.extend(write_failures);
        (written, failures)
    }

    async fn verify(&self) -> Result<Option<TestAggregate>, WorkflowError> {
        let Some(tests) = &self.tests else {
            return Ok(None);
        };

        let root = self.workspace.root();
        let call = AssertUnwindSafe(async move { tests.run_tests(root).await }).catch_unwind();
        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                return Err(WorkflowError::Cancelled(
                    self.cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
                ));
            }
            outcome = call => outcome,
        };

        let aggregate = match outcome {
            Ok(Ok(aggregate)) => aggregate,
            Ok(Err(e)) => {
                warn!("Test execution failed: {}", e);
                TestAggregate::error(format!("Failed to execute tests: {e}"))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Test capability panicked: {}", message);
                TestAggregate::error(format!("Failed to execute tests: test capability panicked: {message}"))
            }
        };

        if let Err(e) = self.workspace.remove_cache_dirs().await {
            debug!("Could not remove cache directories: {}", e);
        }
        Ok(Some(aggregate))
    }
}

impl std::fmt::Debug for WorkflowRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRunner")
            .field("config", &self.config)
            .field("has_test_capability", &self.tests.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct RunClock {
    run_id: Uuid,
    at: Timestamp,
    clock: Instant,
}

impl RunClock {
    fn start(run_id: Uuid) -> Self {
        Self {
            run_id,
            at: now_utc(),
            clock: Instant::now(),
        }
    }

    fn failed(&self, e: &WorkflowError, transcript: Transcript, iterations: u32) -> WorkflowResult {
        WorkflowResult {
            run_id: self.run_id,
            status: WorkflowStatus::Error,
            total_messages: transcript.len(),
            revision_iterations: iterations,
            artifacts_extracted: 0,
            artifacts: Vec::new(),
            extraction_failures: Vec::new(),
            test_outcome: None,
            error: Some(e.to_result_message()),
            termination: None,
            transcript: transcript.into_entries(),
            started_at: self.at,
            finished_at: now_utc(),
            duration_ms: elapsed_ms(self.clock),
        }
    }
}

/// Runs `request` through the standard pipeline with default settings.
///
/// Generated tests are executed with the default [`SubprocessTestRunner`].
pub async fn run_workflow(
    request: &str,
    invoker: Arc<dyn StageInvoker>,
    progress: Option<Arc<dyn ProgressSink>>,
) -> WorkflowResult {
    run_workflow_with_config(request, WorkflowConfig::default(), invoker, progress).await
}

/// Like [`run_workflow`] with an explicit configuration.
pub async fn run_workflow_with_config(
    request: &str,
    config: WorkflowConfig,
    invoker: Arc<dyn StageInvoker>,
    progress: Option<Arc<dyn ProgressSink>>,
) -> WorkflowResult {
    let runner = match WorkflowRunner::new(config, invoker) {
        Ok(runner) => runner,
        Err(e) => {
            let e = WorkflowError::from(e);
            return RunClock::start(Uuid::new_v4()).failed(&e, Transcript::new(), 0);
        }
    };
    let runner = match progress {
        Some(progress) => runner.with_progress(progress),
        None => runner,
    };
    runner.run(request).await
}
