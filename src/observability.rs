//! Structured logging setup and span constructors.
//!
//! Logs go to stderr; stdout is reserved for command output.

use clap::ValueEnum;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed multi-line logs (for development).
    Pretty,
    /// Single-line human-readable logs.
    #[default]
    Compact,
}

/// Initializes the logging subsystem.
///
/// Safe to call multiple times; subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `paycycle=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);

        match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init(),
        }
    });
}

/// Span wrapping one consumer worker for its whole lifetime.
#[must_use]
pub fn consumer_span(subject: &str) -> Span {
    tracing::info_span!("consumer", subject = subject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Compact);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn test_consumer_span_enters() {
        let span = consumer_span("employee.registered");
        let _guard = span.enter();
        tracing::info!("inside consumer span");
    }
}
