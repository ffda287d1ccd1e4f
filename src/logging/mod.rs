//! Structured logging
//!
//! Installs the global `tracing` subscriber. Output goes to stderr so that
//! command output on stdout stays machine-readable.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Logging error types
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Initialization error: {0}")]
    InitError(String),
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `chatpoll=debug,info`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable text
    #[default]
    Text,
}

/// Pick the filter directives: a non-blank `RUST_LOG` wins over config
fn filter_directives(config: &LoggingConfig, env_override: Option<String>) -> String {
    env_override
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

fn build_filter(config: &LoggingConfig, env_override: Option<String>) -> Result<EnvFilter, LoggingError> {
    let directives = filter_directives(config, env_override);
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_filter(config, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| LoggingError::InitError(e.to_string()))?;

    info!(format = ?config.format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_logging_config_from_json() {
        let config: LoggingConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_env_override_wins() {
        let config = LoggingConfig::default();
        assert_eq!(filter_directives(&config, None), "info");
        assert_eq!(filter_directives(&config, Some("  ".into())), "info");
        assert_eq!(
            filter_directives(&config, Some("chatpoll=trace".into())),
            "chatpoll=trace"
        );
    }

    #[test]
    fn test_invalid_filter() {
        let config = LoggingConfig {
            level: "chatpoll=loudest".to_string(),
            ..Default::default()
        };
        let err = build_filter(&config, None).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
        assert!(build_filter(&LoggingConfig::default(), None).is_ok());
    }
}
