//! Error types for the article tracker.

use thiserror::Error;

/// Common error type for the article tracker.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Feed fetch failure.
    ///
    /// Covers transport errors, non-success HTTP status and unparseable
    /// feed documents. Recoverable: the next cycle retries.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Durable store failure.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("storage error: {0}")]
    Storage(String),

    /// Webhook delivery failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Whether this error counts toward the consecutive cycle failure threshold.
    pub fn is_cycle_failure(&self) -> bool {
        matches!(self, TrackerError::Fetch(_) | TrackerError::Storage(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for TrackerError {
    fn from(e: sqlx::Error) -> Self {
        TrackerError::Storage(e.to_string())
    }
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = TrackerError::Fetch("HTTP error: 500".to_string());
        assert_eq!(err.to_string(), "fetch error: HTTP error: 500");
    }

    #[test]
    fn test_storage_error_display() {
        let err = TrackerError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn test_config_error_display() {
        let err = TrackerError::Config("feed url missing".to_string());
        assert_eq!(err.to_string(), "configuration error: feed url missing");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TrackerError = io_err.into();
        assert!(matches!(err, TrackerError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: TrackerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, TrackerError::Storage(_)));
    }

    #[test]
    fn test_cycle_failure_kinds() {
        assert!(TrackerError::Fetch("x".into()).is_cycle_failure());
        assert!(TrackerError::Storage("x".into()).is_cycle_failure());
        assert!(!TrackerError::Delivery("x".into()).is_cycle_failure());
        assert!(!TrackerError::Config("x".into()).is_cycle_failure());
    }
}
