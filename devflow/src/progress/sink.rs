//! Progress sink trait and implementations.

use super::ProgressUpdate;
use crate::errors::ProgressError;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receives progress notifications.
///
/// Notifications are fire-and-forget. An `Err` is logged by the caller and
/// otherwise ignored.
pub trait ProgressSink: Send + Sync {
    /// Handles one update.
    fn notify(&self, update: &ProgressUpdate) -> Result<(), ProgressError>;
}

/// A sink that discards every update.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn notify(&self, _update: &ProgressUpdate) -> Result<(), ProgressError> {
        Ok(())
    }
}

/// A sink that logs updates through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn notify(&self, update: &ProgressUpdate) -> Result<(), ProgressError> {
        let stage = update.stage.map(|s| s.as_str());
        if self.level == Level::DEBUG {
            debug!(stage = ?stage, action = %update.action, iteration = ?update.iteration, "Progress: {}", update);
        } else {
            info!(stage = ?stage, action = %update.action, iteration = ?update.iteration, "Progress: {}", update);
        }
        Ok(())
    }
}

/// A sink that records updates, for tests and polling front ends.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    updates: RwLock<Vec<ProgressUpdate>>,
}

impl CollectingProgressSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates received so far.
    #[must_use]
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.read().clone()
    }

    /// Action labels in arrival order.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.updates.read().iter().map(|u| u.action.clone()).collect()
    }

    /// The most recent update.
    #[must_use]
    pub fn last(&self) -> Option<ProgressUpdate> {
        self.updates.read().last().cloned()
    }

    /// Number of updates received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.read().len()
    }

    /// Returns true if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.read().is_empty()
    }

    /// Drops all recorded updates.
    pub fn clear(&self) {
        self.updates.write().clear();
    }
}

impl ProgressSink for CollectingProgressSink {
    fn notify(&self, update: &ProgressUpdate) -> Result<(), ProgressError> {
        self.updates.write().push(update.clone());
        Ok(())
    }
}

/// Adapts a closure into a [`ProgressSink`].
pub struct FnProgressSink<F> {
    f: F,
}

impl<F> FnProgressSink<F>
where
    F: Fn(&ProgressUpdate) -> Result<(), ProgressError> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for FnProgressSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProgressSink").finish_non_exhaustive()
    }
}

impl<F> ProgressSink for FnProgressSink<F>
where
    F: Fn(&ProgressUpdate) -> Result<(), ProgressError> + Send + Sync,
{
    fn notify(&self, update: &ProgressUpdate) -> Result<(), ProgressError> {
        (self.f)(update)
    }
}
