//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The transport has no connection to the upstream API.
    #[error("not connected to server")]
    NotConnected,

    /// Upstream rejected the request (auth, rate limit, 5xx).
    #[error("server error: {0}")]
    ServerError(String),

    /// Payload did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No replica is held for this budget.
    #[error("replica not found: {0}")]
    ReplicaNotFound(String),

    /// A configuration value could not be parsed.
    #[error("invalid config {key}={value:?}: {reason}")]
    InvalidConfig {
        /// Configuration key.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Audit trail write failed.
    #[error("audit error: {0}")]
    Audit(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a configuration error.
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if a caller may retry the operation.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) => true,
            SyncError::NotConnected => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid token").is_retryable());
        assert!(SyncError::ServerError("429 too many requests".into()).is_retryable());
        assert!(!SyncError::ReplicaNotFound("b1".into()).is_retryable());
        assert!(!SyncError::Audit("disk full".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to server");

        let err = SyncError::invalid_config("BUDGETSYNC_SYNC_INTERVAL_SECONDS", "soon", "not a number");
        let text = err.to_string();
        assert!(text.contains("BUDGETSYNC_SYNC_INTERVAL_SECONDS"));
        assert!(text.contains("\"soon\""));
    }

    #[test]
    fn serde_errors_convert() {
        let err: SyncError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert!(matches!(err, SyncError::Serialization(_)));
    }
}
