//! The stage orchestrator: drives stages until a terminal transition.

use super::transition::{
    NextStage, RevisionCounter, TerminalReason, Transition, TransitionKind, TransitionTable,
};
use crate::cancellation::CancellationToken;
use crate::config::WorkflowConfig;
use crate::core::{StageId, Transcript};
use crate::errors::{panic_message, StageError, WorkflowError};
use crate::progress::{NoOpProgressSink, ProgressSink, ProgressUpdate};
use crate::stages::StageInvoker;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default cap on stage invocations per run.
pub const DEFAULT_MAX_ROUNDS: usize = 50;

/// Per-run state machine over a [`TransitionTable`].
///
/// Owns the transcript and the revision counter. Stages are invoked one at a
/// time and each output is appended before the next transition is computed.
pub struct Orchestrator {
    table: Arc<TransitionTable>,
    max_rounds: usize,
    progress: Arc<dyn ProgressSink>,
    counter: RevisionCounter,
    rounds: usize,
    transcript: Transcript,
}

impl Orchestrator {
    /// Creates an orchestrator with no progress sink and the default round cap.
    #[must_use]
    pub fn new(table: Arc<TransitionTable>) -> Self {
        Self {
            table,
            max_rounds: DEFAULT_MAX_ROUNDS,
            progress: Arc::new(NoOpProgressSink),
            counter: RevisionCounter::new(),
            rounds: 0,
            transcript: Transcript::new(),
        }
    }

    /// Creates an orchestrator from a workflow configuration.
    #[must_use]
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(Arc::new(TransitionTable::from_config(config))).with_max_rounds(config.max_rounds)
    }

    /// Sets the round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// The transcript so far.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Consumes the orchestrator and returns its transcript.
    #[must_use]
    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Current value of the revision counter.
    #[must_use]
    pub fn revision_iterations(&self) -> u32 {
        self.counter.get()
    }

    /// Number of stage invocations completed.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Runs the pipeline for `request` until it reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Stage`] when an invocation fails or panics and
    /// [`WorkflowError::Cancelled`] when `cancel` fires. The transcript and
    /// counter keep the state reached before the failure.
    pub async fn run(
        &mut self,
        request: &str,
        invoker: &dyn StageInvoker,
        cancel: &CancellationToken,
    ) -> Result<TerminalReason, WorkflowError> {
        self.transcript.append(StageId::Start, request);
        let mut last = StageId::Start;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(cancel));
            }

            let transition = self.table.select_next(last, &self.transcript, self.counter);
            self.counter = transition.counter;
            log_transition(&transition);

            let stage = match transition.next {
                NextStage::Terminal(reason) => {
                    self.notify(&transition.progress());
                    info!(reason = %reason, rounds = self.rounds, "Pipeline finished");
                    return Ok(reason);
                }
                NextStage::Stage(stage) => stage,
            };

            if self.rounds >= self.max_rounds {
                warn!(
                    max_rounds = self.max_rounds,
                    pending = %stage,
                    "Round limit reached, stopping pipeline"
                );
                self.notify(&ProgressUpdate::complete());
                return Ok(TerminalReason::RoundLimit);
            }

            self.notify(&transition.progress());

            let content = invoke_stage(invoker, stage, &self.transcript, cancel).await?;
            debug!(stage = %stage, chars = content.chars().count(), "Stage produced output");
            self.transcript.append(stage, content);
            self.rounds += 1;
            last = stage;
        }
    }

    fn notify(&self, update: &ProgressUpdate) {
        let progress = &self.progress;
        match std::panic::catch_unwind(AssertUnwindSafe(|| progress.notify(update))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(update = %update, "Progress sink failed: {}", e),
            Err(payload) => warn!(
                update = %update,
                "Progress sink panicked: {}",
                panic_message(payload.as_ref())
            ),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("max_rounds", &self.max_rounds)
            .field("counter", &self.counter)
            .field("rounds", &self.rounds)
            .field("transcript_len", &self.transcript.len())
            .finish_non_exhaustive()
    }
}

async fn invoke_stage(
    invoker: &dyn StageInvoker,
    stage: StageId,
    transcript: &Transcript,
    cancel: &CancellationToken,
) -> Result<String, WorkflowError> {
    let call = AssertUnwindSafe(async move { invoker.invoke(stage, transcript).await }).catch_unwind();

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(cancelled(cancel)),
        outcome = call => outcome,
    };

    match outcome {
        Ok(Ok(content)) => Ok(content),
        Ok(Err(e)) => {
            error!(stage = %stage, kind = %e.kind, "Stage invocation failed: {}", e);
            Err(WorkflowError::stage(stage, e))
        }
        Err(payload) => {
            let e = StageError::from_panic(payload.as_ref());
            error!(stage = %stage, "Stage invocation panicked: {}", e);
            Err(WorkflowError::stage(stage, e))
        }
    }
}

fn cancelled(cancel: &CancellationToken) -> WorkflowError {
    WorkflowError::Cancelled(cancel.reason().unwrap_or_else(|| "cancelled".to_string()))
}

fn log_transition(t: &Transition) {
    let iteration = t.counter.get();
    match t.kind {
        TransitionKind::ForcedAdvance => warn!(
            from = %t.from, to = %t.next, kind = %t.kind, iteration,
            "Revision ceiling reached, advancing without approval"
        ),
        TransitionKind::DefaultApproved => warn!(
            from = %t.from, to = %t.next, kind = %t.kind, iteration,
            "Review carried no verdict, treating as approved"
        ),
        TransitionKind::Rework if t.verdict == Some(super::ReviewVerdict::Ambiguous) => warn!(
            from = %t.from, to = %t.next, kind = %t.kind, iteration,
            "Review carried no verdict, treating as rework"
        ),
        TransitionKind::Defect => error!(
            from = %t.from, kind = %t.kind,
            "Stage has no transition, ending run"
        ),
        _ => debug!(from = %t.from, to = %t.next, kind = %t.kind, iteration, "Transition"),
    }
}
