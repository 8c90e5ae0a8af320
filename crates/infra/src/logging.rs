//! Process-wide `tracing` subscriber setup
//!
//! The filter comes from `BULWARK_LOG` (an `EnvFilter` directive string such
//! as `bulwark=debug,info`), falling back to the default passed by the caller.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the filter directives
pub const LOG_ENV: &str = "BULWARK_LOG";

/// Filter used when neither the caller nor the environment picks one
pub const DEFAULT_DIRECTIVES: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Pretty,
    /// Newline-delimited JSON
    Json,
}

bulwark_domain::impl_label_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Filter from `BULWARK_LOG`, or `default` when the variable is unset
///
/// # Errors
/// Returns `LoggingError::Filter` if either directive string is malformed.
pub fn env_filter(default: &str) -> Result<EnvFilter, LoggingError> {
    filter_from(std::env::var(LOG_ENV).ok().as_deref(), default)
}

/// Install the global subscriber
///
/// # Errors
/// Returns `LoggingError::AlreadyInitialized` if a global subscriber is
/// already set, and `LoggingError::Filter` for a malformed `BULWARK_LOG`.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let registry = tracing_subscriber::registry().with(env_filter(DEFAULT_DIRECTIVES)?);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init()?,
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_target(true).with_current_span(true)).try_init()?;
        }
    }

    tracing::debug!(format = %format, "logging initialized");
    Ok(())
}

fn filter_from(directives: Option<&str>, default: &str) -> Result<EnvFilter, LoggingError> {
    let directives = directives.map(str::trim).filter(|d| !d.is_empty()).unwrap_or(default);
    Ok(EnvFilter::try_new(directives)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_labels() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(LogFormat::default().as_str(), "pretty");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_filter_falls_back_to_default() {
        let filter = filter_from(None, "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");

        let filter = filter_from(Some("  "), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");

        let filter = filter_from(Some("bulwark=debug"), "warn").unwrap();
        assert_eq!(filter.to_string(), "bulwark=debug");
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging(LogFormat::Pretty);
        assert!(matches!(
            init_logging(LogFormat::Json),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
