//! Testing utilities for devflow workflows.
//!
//! This module provides:
//! - Scripted and failing stage invokers
//! - Static and failing test capabilities
//! - File block fixtures and workflow assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_stage_sequence, assert_workflow_failed, assert_workflow_succeeded,
    assert_workspace_file,
};
pub use fixtures::{file_block, passing_outcome, standard_sequence};
pub use mocks::{FailingInvoker, FailingTestCapability, ScriptedInvoker, StaticTestCapability};
