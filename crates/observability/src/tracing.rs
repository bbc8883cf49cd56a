//! Tracing/logging initialization.
//!
//! Production runs emit JSON lines at `info`; development mode switches to
//! human-readable output at `debug`. `RUST_LOG` overrides either default.

use std::backtrace::Backtrace;
use std::panic;

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn for_mode(development: bool) -> Self {
        if development {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }

    fn default_directive(self) -> &'static str {
        match self {
            LogFormat::Json => "info",
            LogFormat::Pretty => "debug",
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format.default_directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

/// Route panics through `tracing` with a captured backtrace.
///
/// Request handlers run on their own tasks, so a panic there is caught at the
/// join point; this hook only makes sure its location and stack get logged.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();

        ::tracing::error!(
            panic = %message,
            location = %location,
            backtrace = %backtrace,
            "Got panic in api handler"
        );
    }));
}

/// Per-request correlation id: a time-ordered UUID rendered as 32 uppercase
/// hex digits.
pub fn new_trace_id() -> String {
    Uuid::now_v7().simple().to_string().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_uppercase_hex_and_unique() {
        let a = new_trace_id();
        let b = new_trace_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn development_mode_selects_pretty_debug_output() {
        assert_eq!(LogFormat::for_mode(true), LogFormat::Pretty);
        assert_eq!(LogFormat::for_mode(false).default_directive(), "info");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Json);
        init(LogFormat::Json);
    }
}
