//! Stage invocation.
//!
//! Content generation happens outside this crate. The orchestrator only asks a
//! [`StageInvoker`] for the next stage's output given the transcript so far.

use crate::core::{StageId, Transcript};
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Produces the content of a stage.
///
/// Implementations own their own timeouts and retries. Any error returned here
/// ends the run with an `error` result.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    /// Runs `stage` against the transcript and returns its output.
    async fn invoke(&self, stage: StageId, transcript: &Transcript) -> Result<String, StageError>;
}

/// A closure-based invoker.
///
/// Errors from the closure are wrapped as [`StageError`] with the `Other` kind.
pub struct FnInvoker<F>
where
    F: Fn(StageId, &Transcript) -> anyhow::Result<String> + Send + Sync,
{
    func: F,
}

impl<F> FnInvoker<F>
where
    F: Fn(StageId, &Transcript) -> anyhow::Result<String> + Send + Sync,
{
    /// Wraps `func`.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnInvoker<F>
where
    F: Fn(StageId, &Transcript) -> anyhow::Result<String> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInvoker").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StageInvoker for FnInvoker<F>
where
    F: Fn(StageId, &Transcript) -> anyhow::Result<String> + Send + Sync,
{
    async fn invoke(&self, stage: StageId, transcript: &Transcript) -> Result<String, StageError> {
        (self.func)(stage, transcript).map_err(StageError::from)
    }
}
