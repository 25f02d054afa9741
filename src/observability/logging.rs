//! Structured logging initialisation.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: readable lines for local development
//! - [`LogFormat::Json`]: newline-delimited JSON for log aggregation
//!
//! `RUST_LOG` overrides the caller-supplied level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Human,
    /// Newline-delimited JSON
    Json,
}

impl From<&LoggingSettings> for LogFormat {
    fn from(settings: &LoggingSettings) -> Self {
        if settings.json {
            LogFormat::Json
        } else {
            LogFormat::Human
        }
    }
}

/// Build the filter: `RUST_LOG` if set, otherwise `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed; the existing one
/// is kept.
pub fn init_logging(format: LogFormat, level: &str) -> bool {
    let filter = env_filter(level);

    let result = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_settings() {
        let mut settings = LoggingSettings::default();
        assert_eq!(LogFormat::from(&settings), LogFormat::Human);
        settings.json = true;
        assert_eq!(LogFormat::from(&settings), LogFormat::Json);
    }

    #[test]
    fn test_second_init_is_not_fatal() {
        init_logging(LogFormat::Human, "warn");
        assert!(!init_logging(LogFormat::Json, "debug"));
    }
}
