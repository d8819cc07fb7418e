//! Error types and result handling for core operations.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for store and codec operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Queue store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// Event serialization or deserialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
