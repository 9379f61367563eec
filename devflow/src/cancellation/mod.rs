//! Cooperative cancellation of a workflow run.
//!
//! A [`CancellationToken`] is shared between the caller and the runner. The
//! runner checks it between stages and races it against every in-flight
//! stage or test invocation.

mod token;

pub use token::CancellationToken;
