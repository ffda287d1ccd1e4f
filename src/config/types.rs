//! Config sections for the poll service
//!
//! Listener, storage backend, vote handling and logging. Every field has a
//! default; `validate` collects all problems instead of stopping at the first.

use crate::logging::LoggingConfig;
use crate::polls::recorder::{VoteStrategy, DEFAULT_MAX_ATTEMPTS};
use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Where polls and ledgers are kept
    pub storage: StorageConfig,
    /// Vote concurrency handling
    pub voting: VotingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ValidationError {
                path: "server.port".to_string(),
                message: "port must be between 1 and 65535".to_string(),
            });
        }
        if self.server.bind.trim().is_empty() {
            errors.push(ValidationError {
                path: "server.bind".to_string(),
                message: "bind address is required".to_string(),
            });
        }
        if self.voting.max_attempts == 0 {
            errors.push(ValidationError {
                path: "voting.maxAttempts".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if let StorageConfig::File { path } = &self.storage {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError {
                    path: "storage.path".to_string(),
                    message: "file storage needs a directory".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Address the HTTP server listens on
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    /// Base URL used in outbound button callbacks
    pub fn public_url(&self) -> String {
        self.server
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen_addr()))
    }
}

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Interface to bind
    pub bind: String,
    /// TCP port
    pub port: u16,
    /// Externally reachable base URL, if different from the bind address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8065,
            public_url: None,
        }
    }
}

/// Storage backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local map, lost on exit
    #[default]
    Memory,
    /// One file per record under `path`
    File { path: PathBuf },
}

impl StorageConfig {
    /// Open the configured store
    pub async fn open(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        match self {
            StorageConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            StorageConfig::File { path } => Ok(Arc::new(FileStore::open(path.clone()).await?)),
        }
    }

    /// Whether records survive a restart
    pub fn is_persistent(&self) -> bool {
        matches!(self, StorageConfig::File { .. })
    }
}

/// Vote handling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VotingConfig {
    /// How concurrent votes on one poll are serialised
    pub strategy: VoteStrategy,
    /// Retry bound for the optimistic strategy
    pub max_attempts: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            strategy: VoteStrategy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.voting.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.public_url(), "http://127.0.0.1:8065");
    }

    #[test]
    fn test_parse_partial_json5() {
        let raw = r#"{
            // only what differs from the defaults
            server: { port: 9000, publicUrl: "https://polls.example.com" },
            storage: { backend: "file", path: "/var/lib/chatpoll" },
            voting: { strategy: "optimistic", maxAttempts: 8 },
            logging: { format: "json" },
        }"#;
        let config: Config = json5::from_str(raw).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.public_url(), "https://polls.example.com");
        assert_eq!(
            config.storage,
            StorageConfig::File {
                path: PathBuf::from("/var/lib/chatpoll")
            }
        );
        assert_eq!(config.voting.strategy, VoteStrategy::Optimistic);
        assert_eq!(config.voting.max_attempts, 8);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.voting.max_attempts = 0;
        config.storage = StorageConfig::File {
            path: PathBuf::new(),
        };

        let errors = config.validate().unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["server.port", "voting.maxAttempts", "storage.path"]);
    }

    #[tokio::test]
    async fn test_open_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig::File {
            path: dir.path().join("data"),
        };
        assert!(storage.is_persistent());

        let store = storage.open().await.unwrap();
        store.set("k", b"v".to_vec()).await.unwrap();
        assert!(dir.path().join("data").is_dir());
    }
}
