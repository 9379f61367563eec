//! Transition selection for the stage orchestrator.
//!
//! [`TransitionTable::select_next`] is a pure function of the last speaker,
//! the transcript and the revision counter. It performs no I/O and reads no
//! clock, so the same inputs always produce the same [`Transition`].

use super::review::{AmbiguousReviewPolicy, ReviewMarkers, ReviewVerdict};
use super::spec::{PipelineSpec, ReviewLoop};
use crate::config::WorkflowConfig;
use crate::core::{StageId, Transcript};
use crate::progress::ProgressUpdate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default number of rework rounds before the loop is forced open.
pub const DEFAULT_REVISION_CEILING: u32 = 5;

/// Rework rounds taken in the current pass through the review loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionCounter(u32);

impl RevisionCounter {
    /// A counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Current value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The counter after one more rework.
    #[must_use]
    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The counter after entering the loop from outside.
    #[must_use]
    pub fn reset(self) -> Self {
        Self(0)
    }
}

impl From<u32> for RevisionCounter {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Why the orchestrator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "stage")]
pub enum TerminalReason {
    /// The final stage spoke.
    Completed,
    /// Control came back to the start stage after the pipeline had finished.
    StartAfterCompletion,
    /// The last speaker has no entry in the transition table.
    UnknownStage(StageId),
    /// The round cap was reached.
    RoundLimit,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::StartAfterCompletion => write!(f, "start after completion"),
            Self::UnknownStage(stage) => write!(f, "unknown stage '{stage}'"),
            Self::RoundLimit => write!(f, "round limit reached"),
        }
    }
}

/// The next step chosen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStage {
    /// Invoke this stage next.
    Stage(StageId),
    /// Stop.
    Terminal(TerminalReason),
}

impl NextStage {
    /// The stage to invoke, if any.
    #[must_use]
    pub fn stage(self) -> Option<StageId> {
        match self {
            Self::Stage(stage) => Some(stage),
            Self::Terminal(_) => None,
        }
    }

    /// Returns true when the run should stop.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

impl fmt::Display for NextStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => write!(f, "{stage}"),
            Self::Terminal(reason) => write!(f, "end ({reason})"),
        }
    }
}

/// Classification of a transition, used for logging and progress labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Start stage handing off to the first content stage.
    Start,
    /// Ordinary move to the next stage.
    Advance,
    /// Reviewer sent the producer back for another pass.
    Rework,
    /// Rework requested but the ceiling was reached.
    ForcedAdvance,
    /// Reviewer approved.
    Approved,
    /// Reviewer gave no verdict and the fail-open policy approved.
    DefaultApproved,
    /// The pipeline finished.
    Completion,
    /// The last speaker is not part of the pipeline.
    Defect,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Start => "start",
            Self::Advance => "advance",
            Self::Rework => "rework",
            Self::ForcedAdvance => "forced_advance",
            Self::Approved => "approved",
            Self::DefaultApproved => "default_approved",
            Self::Completion => "completion",
            Self::Defect => "defect",
        };
        f.write_str(label)
    }
}

/// The result of one `select_next` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The stage that just spoke.
    pub from: StageId,
    /// Where control goes next.
    pub next: NextStage,
    /// What kind of move this is.
    pub kind: TransitionKind,
    /// The revision counter after this transition.
    pub counter: RevisionCounter,
    /// The classified review, when `from` is the reviewer.
    pub verdict: Option<ReviewVerdict>,
}

impl Transition {
    /// The progress notification for this transition.
    #[must_use]
    pub fn progress(&self) -> ProgressUpdate {
        match self.next {
            NextStage::Terminal(_) => ProgressUpdate::complete(),
            NextStage::Stage(stage) if self.kind == TransitionKind::Rework => {
                ProgressUpdate::rework(stage, self.counter.get())
            }
            NextStage::Stage(stage) => ProgressUpdate::stage(stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Begin { first: StageId, last: StageId },
    Advance(StageId),
    Review { producer: StageId, downstream: Option<StageId> },
    Finish,
}

/// Explicit stage-to-edge map built once from a [`PipelineSpec`].
#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: HashMap<StageId, Edge>,
    review_loop: Option<ReviewLoop>,
    revision_ceiling: u32,
    ambiguous_policy: AmbiguousReviewPolicy,
    markers: ReviewMarkers,
}

impl TransitionTable {
    /// Builds the table for a pipeline with default review settings.
    #[must_use]
    pub fn new(spec: &PipelineSpec) -> Self {
        let mut edges = HashMap::new();
        let review_loop = spec.review_loop();

        if let (Some(first), Some(last)) = (spec.first(), spec.last()) {
            edges.insert(StageId::Start, Edge::Begin { first, last });
        }

        for &stage in spec.stages() {
            let successor = spec.successor(stage);
            let edge = match review_loop {
                Some(rl) if rl.reviewer == stage => Edge::Review {
                    producer: rl.producer,
                    downstream: successor,
                },
                _ => successor.map_or(Edge::Finish, Edge::Advance),
            };
            edges.insert(stage, edge);
        }

        Self {
            edges,
            review_loop,
            revision_ceiling: DEFAULT_REVISION_CEILING,
            ambiguous_policy: AmbiguousReviewPolicy::default(),
            markers: ReviewMarkers::default(),
        }
    }

    /// Builds the table from a full workflow configuration.
    #[must_use]
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(&config.pipeline)
            .with_revision_ceiling(config.revision_ceiling)
            .with_ambiguous_policy(config.ambiguous_review)
            .with_markers(config.markers.clone())
    }

    /// Sets the rework ceiling.
    #[must_use]
    pub fn with_revision_ceiling(mut self, ceiling: u32) -> Self {
        self.revision_ceiling = ceiling;
        self
    }

    /// Sets how reviews without a marker are treated.
    #[must_use]
    pub fn with_ambiguous_policy(mut self, policy: AmbiguousReviewPolicy) -> Self {
        self.ambiguous_policy = policy;
        self
    }

    /// Sets the review marker tokens.
    #[must_use]
    pub fn with_markers(mut self, markers: ReviewMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// The configured rework ceiling.
    #[must_use]
    pub fn revision_ceiling(&self) -> u32 {
        self.revision_ceiling
    }

    /// The pipeline's review loop, if any.
    #[must_use]
    pub fn review_loop(&self) -> Option<ReviewLoop> {
        self.review_loop
    }

    /// Decides where control goes after `last` spoke.
    #[must_use]
    pub fn select_next(
        &self,
        last: StageId,
        transcript: &Transcript,
        counter: RevisionCounter,
    ) -> Transition {
        let Some(edge) = self.edges.get(&last).copied() else {
            return Transition {
                from: last,
                next: NextStage::Terminal(TerminalReason::UnknownStage(last)),
                kind: TransitionKind::Defect,
                counter,
                verdict: None,
            };
        };

        let mut transition = match edge {
            Edge::Begin { first, last: final_stage } => {
                if transcript.has_spoken(final_stage) {
                    Transition {
                        from: last,
                        next: NextStage::Terminal(TerminalReason::StartAfterCompletion),
                        kind: TransitionKind::Completion,
                        counter,
                        verdict: None,
                    }
                } else {
                    Transition {
                        from: last,
                        next: NextStage::Stage(first),
                        kind: TransitionKind::Start,
                        counter,
                        verdict: None,
                    }
                }
            }
            Edge::Advance(next) => Transition {
                from: last,
                next: NextStage::Stage(next),
                kind: TransitionKind::Advance,
                counter,
                verdict: None,
            },
            Edge::Finish => Transition {
                from: last,
                next: NextStage::Terminal(TerminalReason::Completed),
                kind: TransitionKind::Completion,
                counter,
                verdict: None,
            },
            Edge::Review { producer, downstream } => {
                self.review_transition(last, producer, downstream, transcript, counter)
            }
        };

        if let (Some(rl), NextStage::Stage(next)) = (self.review_loop, transition.next) {
            if next == rl.producer && last != rl.reviewer {
                transition.counter = counter.reset();
            }
        }

        transition
    }

    fn review_transition(
        &self,
        reviewer: StageId,
        producer: StageId,
        downstream: Option<StageId>,
        transcript: &Transcript,
        counter: RevisionCounter,
    ) -> Transition {
        let content = transcript
            .last_from(reviewer)
            .map_or("", |entry| entry.content.as_str());
        let verdict = self.markers.classify(content);

        let effective = match verdict {
            ReviewVerdict::Ambiguous => self.ambiguous_policy.resolve(),
            other => other,
        };

        let onward = downstream.map_or(
            NextStage::Terminal(TerminalReason::Completed),
            NextStage::Stage,
        );

        let (next, kind, counter) = match effective {
            ReviewVerdict::Rework => {
                let counter = counter.increment();
                if counter.get() >= self.revision_ceiling {
                    (onward, TransitionKind::ForcedAdvance, counter)
                } else {
                    (NextStage::Stage(producer), TransitionKind::Rework, counter)
                }
            }
            _ if verdict == ReviewVerdict::Ambiguous => (onward, TransitionKind::DefaultApproved, counter),
            _ => (onward, TransitionKind::Approved, counter),
        };

        Transition {
            from: reviewer,
            next,
            kind,
            counter,
            verdict: Some(verdict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> TransitionTable {
        TransitionTable::new(&PipelineSpec::standard())
    }

    fn transcript_with(entries: &[(StageId, &str)]) -> Transcript {
        let mut transcript = Transcript::new();
        for (stage, content) in entries {
            transcript.append(*stage, *content);
        }
        transcript
    }

    #[test]
    fn test_start_goes_to_first_stage() {
        let transcript = transcript_with(&[(StageId::Start, "build a calculator")]);
        let t = table().select_next(StageId::Start, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Stage(StageId::Requirements));
        assert_eq!(t.kind, TransitionKind::Start);
        assert_eq!(t.verdict, None);
    }

    #[test]
    fn test_start_after_completion_terminates() {
        let transcript = transcript_with(&[
            (StageId::Start, "request"),
            (StageId::Interface, "design notes"),
            (StageId::Start, "anything else?"),
        ]);
        let t = table().select_next(StageId::Start, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Terminal(TerminalReason::StartAfterCompletion));
    }

    #[test]
    fn test_linear_advance() {
        let transcript = transcript_with(&[(StageId::Start, "r"), (StageId::Requirements, "plan")]);
        let t = table().select_next(StageId::Requirements, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Stage(StageId::Implementation));
        assert_eq!(t.kind, TransitionKind::Advance);
    }

    #[test]
    fn test_entering_loop_resets_counter() {
        let transcript = transcript_with(&[(StageId::Requirements, "plan")]);
        let t = table().select_next(StageId::Requirements, &transcript, RevisionCounter::from(3));

        assert_eq!(t.counter.get(), 0);
    }

    #[test]
    fn test_last_stage_completes() {
        let transcript = transcript_with(&[(StageId::Interface, "ui")]);
        let t = table().select_next(StageId::Interface, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Terminal(TerminalReason::Completed));
        assert_eq!(t.kind, TransitionKind::Completion);
        assert_eq!(t.progress(), ProgressUpdate::complete());
    }

    #[test]
    fn test_rework_routes_back_to_producer() {
        let transcript = transcript_with(&[(StageId::Review, "bug on line 3. FIX_REQUIRED")]);
        let t = table().select_next(StageId::Review, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Stage(StageId::Implementation));
        assert_eq!(t.kind, TransitionKind::Rework);
        assert_eq!(t.counter.get(), 1);
        assert_eq!(t.verdict, Some(ReviewVerdict::Rework));

        let update = t.progress();
        assert_eq!(update.stage, Some(StageId::Implementation));
        assert_eq!(update.action, "fixing");
        assert_eq!(update.iteration, Some(1));
    }

    #[test]
    fn test_ceiling_forces_advance() {
        let transcript = transcript_with(&[(StageId::Review, "FIX_REQUIRED")]);
        let t = table().select_next(StageId::Review, &transcript, RevisionCounter::from(4));

        assert_eq!(t.next, NextStage::Stage(StageId::Documentation));
        assert_eq!(t.kind, TransitionKind::ForcedAdvance);
        assert_eq!(t.counter.get(), 5);
    }

    #[test]
    fn test_ceiling_of_n_allows_n_minus_one_reworks() {
        let table = table().with_revision_ceiling(3);
        let transcript = transcript_with(&[(StageId::Review, "FIX_REQUIRED")]);
        let mut counter = RevisionCounter::new();
        let mut routed_back = 0;

        loop {
            let t = table.select_next(StageId::Review, &transcript, counter);
            counter = t.counter;
            if t.kind == TransitionKind::Rework {
                routed_back += 1;
            } else {
                assert_eq!(t.kind, TransitionKind::ForcedAdvance);
                break;
            }
        }

        assert_eq!(routed_back, 2);
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn test_rework_from_reviewer_keeps_counter() {
        let transcript = transcript_with(&[(StageId::Review, "FIX_REQUIRED")]);
        let t = table().select_next(StageId::Review, &transcript, RevisionCounter::from(2));

        // Going back into the producer from the reviewer is not a fresh entry.
        assert_eq!(t.counter.get(), 3);
    }

    #[test]
    fn test_approval_advances_and_keeps_history() {
        let transcript = transcript_with(&[(StageId::Review, "All good. APPROVED")]);
        let t = table().select_next(StageId::Review, &transcript, RevisionCounter::from(2));

        assert_eq!(t.next, NextStage::Stage(StageId::Documentation));
        assert_eq!(t.kind, TransitionKind::Approved);
        assert_eq!(t.counter.get(), 2);
    }

    #[test]
    fn test_ambiguous_fail_open() {
        let transcript = transcript_with(&[(StageId::Review, "seems ok")]);
        let t = table().select_next(StageId::Review, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Stage(StageId::Documentation));
        assert_eq!(t.kind, TransitionKind::DefaultApproved);
        assert_eq!(t.verdict, Some(ReviewVerdict::Ambiguous));
    }

    #[test]
    fn test_ambiguous_fail_closed() {
        let table = table().with_ambiguous_policy(AmbiguousReviewPolicy::FailClosed);
        let transcript = transcript_with(&[(StageId::Review, "seems ok")]);
        let t = table.select_next(StageId::Review, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Stage(StageId::Implementation));
        assert_eq!(t.kind, TransitionKind::Rework);
        assert_eq!(t.counter.get(), 1);
    }

    #[test]
    fn test_reviewer_as_last_stage_completes() {
        let spec = PipelineSpec::linear([StageId::Implementation, StageId::Review])
            .unwrap()
            .with_review_loop(StageId::Implementation, StageId::Review)
            .unwrap();
        let table = TransitionTable::new(&spec);
        let transcript = transcript_with(&[(StageId::Review, "APPROVED")]);
        let t = table.select_next(StageId::Review, &transcript, RevisionCounter::new());

        assert_eq!(t.next, NextStage::Terminal(TerminalReason::Completed));
    }

    #[test]
    fn test_unknown_stage_is_defect() {
        let spec = PipelineSpec::linear([StageId::Requirements, StageId::Implementation]).unwrap();
        let table = TransitionTable::new(&spec);
        let t = table.select_next(StageId::Delivery, &Transcript::new(), RevisionCounter::new());

        assert_eq!(t.next, NextStage::Terminal(TerminalReason::UnknownStage(StageId::Delivery)));
        assert_eq!(t.kind, TransitionKind::Defect);
    }

    #[test]
    fn test_select_next_is_deterministic() {
        let table = table();
        let transcript = transcript_with(&[(StageId::Start, "r"), (StageId::Review, "FIX_REQUIRED")]);
        let a = table.select_next(StageId::Review, &transcript, RevisionCounter::from(1));
        let b = table.select_next(StageId::Review, &transcript, RevisionCounter::from(1));

        assert_eq!(a, b);
    }

    #[test]
    fn test_reviewer_uses_its_own_latest_message() {
        let transcript = transcript_with(&[
            (StageId::Review, "FIX_REQUIRED"),
            (StageId::Implementation, "fixed"),
            (StageId::Review, "APPROVED"),
        ]);
        let t = table().select_next(StageId::Review, &transcript, RevisionCounter::from(1));

        assert_eq!(t.kind, TransitionKind::Approved);
    }
}
