//! Poll errors

use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by poll operations
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Poll not found: {0}")]
    NotFound(String),

    #[error("Corrupt record '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Poll '{poll_id}' is contended: gave up after {attempts} attempts")]
    Contention { poll_id: String, attempts: u32 },

    #[error("Option '{option_id}' is not part of poll '{poll_id}'")]
    InvalidOption { poll_id: String, option_id: String },
}

impl PollError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            PollError::InputValidation(_) => "INPUT_VALIDATION",
            PollError::NotFound(_) => "NOT_FOUND",
            PollError::CorruptRecord { .. } => "CORRUPT_RECORD",
            PollError::Persistence(_) => "PERSISTENCE",
            PollError::Contention { .. } => "CONTENTION",
            PollError::InvalidOption { .. } => "INVALID_OPTION",
        }
    }
}

/// Result type for poll operations
pub type Result<T> = std::result::Result<T, PollError>;
