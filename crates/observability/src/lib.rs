//! Tracing, logging and panic reporting (shared setup).

/// Tracing configuration (filters, layers, panic hook).
pub mod tracing;

pub use crate::tracing::{LogFormat, init, install_panic_hook, new_trace_id};
