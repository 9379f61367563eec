//! # Devflow
//!
//! A stage orchestrator for multi-role software generation pipelines.
//!
//! A run drives a fixed sequence of stages (requirements, implementation,
//! review, documentation, verification, delivery, interface) over a shared
//! transcript, with one bounded review/rework loop. Afterwards devflow:
//!
//! - **Extracts artifacts**: delimited file blocks in stage output become files
//! - **Writes a workspace**: the latest version of each file lands on disk
//! - **Verifies**: a test capability runs the generated tests
//! - **Reports**: a serializable [`WorkflowResult`](workflow::WorkflowResult)
//!
//! Content generation itself is delegated to a [`StageInvoker`](stages::StageInvoker).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use devflow::prelude::*;
//! use std::sync::Arc;
//!
//! let runner = WorkflowRunner::new(WorkflowConfig::default(), Arc::new(MyInvoker))?
//!     .with_progress(Arc::new(LoggingProgressSink::default()));
//!
//! let result = runner.run("Build a calculator").await;
//! println!("{}", result.to_json_pretty()?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod extract;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod stages;
pub mod testing;
pub mod utils;
pub mod verification;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::WorkflowConfig;
    pub use crate::core::{
        AggregateStatus, Artifact, StageId, TestStatus, Transcript, TranscriptEntry,
        WorkflowStatus,
    };
    pub use crate::errors::{StageError, StageErrorKind, TestRunnerError, WorkflowError};
    pub use crate::extract::{ArtifactExtractor, DelimiterConfig, Extraction, Workspace};
    pub use crate::observability::{init_tracing, LogConfig, LogFormat};
    pub use crate::pipeline::{
        AmbiguousReviewPolicy, NextStage, Orchestrator, PipelineSpec, ReviewMarkers,
        TerminalReason, TransitionTable,
    };
    pub use crate::progress::{
        CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink,
        ProgressUpdate,
    };
    pub use crate::stages::{FnInvoker, StageInvoker};
    pub use crate::utils::{iso_timestamp, Timestamp};
    pub use crate::verification::{
        SubprocessTestRunner, TestAggregate, TestCapability, TestOutcome, TestRunnerConfig,
    };
    pub use crate::workflow::{
        run_workflow, run_workflow_with_config, WorkflowResult, WorkflowRunner,
    };
}
