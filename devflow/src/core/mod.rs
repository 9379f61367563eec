//! Core domain model types for devflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identifiers
//! - The append-only transcript
//! - Extracted artifacts
//! - Run and test status enums

mod artifact;
mod stage;
mod status;
mod transcript;

pub use artifact::Artifact;
pub use stage::StageId;
pub use status::{AggregateStatus, TestStatus, WorkflowStatus};
pub use transcript::{Transcript, TranscriptEntry};
