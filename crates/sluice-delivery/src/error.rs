//! Error types for fanout delivery operations.
//!
//! Every delivery failure here is transient from the retry loop's point of
//! view: the dispatcher retries any failed attempt until the per-destination
//! limit is exhausted, then gives up silently. Errors still carry enough
//! context for structured logging and debugging.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error conditions raised by the fanout pipeline.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// The destination answered with something other than the canonical
    /// success status.
    #[error("unexpected status: HTTP {status_code}")]
    UnexpectedStatus {
        /// HTTP status code returned by the destination
        status_code: u16,
    },

    /// Queue store operation failed.
    #[error("store error: {message}")]
    StoreError {
        /// Store error message
        message: String,
    },

    /// Invalid engine or client configuration.
    #[error("invalid configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// Graceful shutdown did not drain in time.
    #[error("graceful shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The drain deadline that was exceeded
        timeout: Duration,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates an unexpected-status error from an HTTP response code.
    pub fn unexpected_status(status_code: u16) -> Self {
        Self::UnexpectedStatus { status_code }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreError { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }
}

impl From<sluice_core::CoreError> for DeliveryError {
    fn from(err: sluice_core::CoreError) -> Self {
        Self::store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        assert_eq!(DeliveryError::timeout(30).to_string(), "request timeout after 30s");
        assert_eq!(
            DeliveryError::unexpected_status(503).to_string(),
            "unexpected status: HTTP 503"
        );
        assert_eq!(
            DeliveryError::network("connection refused").to_string(),
            "network connection failed: connection refused"
        );
    }

    #[test]
    fn core_errors_convert_to_store_errors() {
        let core = sluice_core::CoreError::Store("down".to_string());
        let delivery = DeliveryError::from(core);
        assert!(matches!(delivery, DeliveryError::StoreError { .. }));
    }
}
