//! Logging setup for youdo-api
//!
//! Structured logs go to stdout through `tracing_subscriber`, as JSON by
//! default or in a human-readable form for local development. `RUST_LOG`,
//! when set, overrides the configured level.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Logging setup errors
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Parse a format name; anything unrecognised falls back to JSON
    pub fn parse(format: &str) -> Self {
        match format.to_lowercase().as_str() {
            "pretty" | "text" | "plain" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Map a level name to a tracing level; unknown names mean `info`
pub fn parse_level(log_level: &str) -> Level {
    match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(&config.level).to_string()))
}

/// Initialize the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config);

    match LogFormat::parse(&config.format) {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    }
    .map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Level names map to the matching level
    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    // Test 2: Format names
    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("Pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    // Test 3: Second initialization fails instead of panicking
    #[test]
    fn test_init_twice() {
        let config = LoggingConfig::default();
        let first = init_tracing(&config);
        let second = init_tracing(&config);

        // Another test may have installed a subscriber first; either way the
        // second call must report an error
        let _ = first;
        assert!(matches!(second, Err(LoggingError::Init(_))));
    }
}
