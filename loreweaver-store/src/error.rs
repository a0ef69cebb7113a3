//! Storage error type.

use thiserror::Error;

/// Errors from any storage implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind ("session", "snapshot", "entity", ...).
        kind: &'static str,
        /// The missing id.
        id: String,
    },

    /// Input failed validation before any IO happened.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying IO failed.
    #[error("io error: {0}")]
    Io(String),

    /// A record could not be (de)serialised.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A concurrent modification was detected.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
