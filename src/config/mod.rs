//! Configuration loading
//!
//! Reads a JSON5 file, layers `CHATPOLL_*` environment variables on top and
//! validates the result. A missing file yields the defaults.

pub mod types;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use types::{Config, ServerConfig, StorageConfig, ValidationError, VotingConfig};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "CHATPOLL_CONFIG";

const ENV_BIND: &str = "CHATPOLL_BIND";
const ENV_PORT: &str = "CHATPOLL_PORT";
const ENV_PUBLIC_URL: &str = "CHATPOLL_PUBLIC_URL";
const ENV_DATA_DIR: &str = "CHATPOLL_DATA_DIR";
const ENV_LOG_LEVEL: &str = "CHATPOLL_LOG_LEVEL";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Invalid configuration: {}", format_issues(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_issues(issues: &[ValidationError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolve the config file location
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatpoll")
        .join("config.json5")
}

/// Load configuration from the default location and the process environment
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_with(&get_config_path(), |var| std::env::var(var).ok())
}

/// Load configuration from `path`, taking overrides from `lookup`
pub fn load_config_with<F>(path: &Path, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = load_config_file(path)?;
    apply_env_overrides(&mut config, lookup)?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Parse the file at `path` without overrides or validation
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    json5::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Apply `CHATPOLL_*` overrides; blank values are ignored
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(bind) = get(ENV_BIND) {
        config.server.bind = bind;
    }
    if let Some(port) = get(ENV_PORT) {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_PORT,
            reason: format!("{}", e),
        })?;
    }
    if let Some(url) = get(ENV_PUBLIC_URL) {
        config.server.public_url = Some(url);
    }
    if let Some(dir) = get(ENV_DATA_DIR) {
        config.storage = StorageConfig::File {
            path: PathBuf::from(dir),
        };
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    Ok(())
}
