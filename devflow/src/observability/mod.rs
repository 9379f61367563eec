//! Observability setup.
//!
//! The crate logs through `tracing` everywhere. Applications that do not
//! install their own subscriber can call [`init_tracing`].

mod logging;

pub use logging::{init_tracing, LogConfig, LogFormat};
