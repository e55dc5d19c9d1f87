//! Error types for the subscription layer.

use thiserror::Error;

/// Main error type for subscription operations.
///
/// Cloneable so the same error can be surfaced on an event stream and
/// returned to a caller without consuming it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("realtime backend not configured")]
    NotConfigured,

    #[error("failed to reconnect after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("invalid {entity} payload: {message}")]
    Validation { entity: String, message: String },

    #[error("subscription already active: {0}")]
    AlreadyActive(String),
}

impl SyncError {
    /// Build a validation error from a parse failure for a named entity.
    pub fn validation(entity: &str, err: impl std::fmt::Display) -> Self {
        SyncError::Validation {
            entity: entity.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SyncError>;
