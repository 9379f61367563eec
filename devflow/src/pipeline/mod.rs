//! Pipeline definition and execution.
//!
//! This module provides:
//! - Pipeline specifications (stage order and the revision loop)
//! - Review verdict classification
//! - The pure transition table
//! - The orchestrator that drives stages to a terminal state

mod orchestrator;
mod review;
mod spec;
mod transition;

pub use orchestrator::{Orchestrator, DEFAULT_MAX_ROUNDS};
pub use review::{AmbiguousReviewPolicy, ReviewMarkers, ReviewVerdict};
pub use spec::{PipelineSpec, ReviewLoop};
pub use transition::{
    NextStage, RevisionCounter, TerminalReason, Transition, TransitionKind, TransitionTable,
    DEFAULT_REVISION_CEILING,
};
