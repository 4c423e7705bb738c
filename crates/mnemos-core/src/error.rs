//! Error types for mnemos.

use thiserror::Error;

/// Result type alias using mnemos's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mnemos operations.
///
/// Partial failures of batch operations are never represented here; they are
/// folded into the stats of the operation that produced them.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding provider call failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Generation provider call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Ingestion job error
    #[error("Job error: {0}")]
    Job(String),

    /// Cache operation failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (missing credentials, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input, rejected before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Operation was cancelled by its caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures of an external embedding or generation provider.
    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::Inference(_))
    }

    /// True when the operation was stopped by a deadline or cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Cancelled(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("document task_1".to_string());
        assert_eq!(err.to_string(), "Not found: document task_1");
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("provider unavailable".to_string());
        assert_eq!(err.to_string(), "Embedding error: provider unavailable");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_search() {
        let err = Error::Search("dimension mismatch".to_string());
        assert_eq!(err.to_string(), "Search error: dimension mismatch");
    }

    #[test]
    fn test_error_display_job() {
        let err = Error::Job("Ingestion job already running".to_string());
        assert_eq!(err.to_string(), "Job error: Ingestion job already running");
    }

    #[test]
    fn test_error_display_cache() {
        let err = Error::Cache("decompression failed".to_string());
        assert_eq!(err.to_string(), "Cache error: decompression failed");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("organization_id is required".to_string());
        assert_eq!(err.to_string(), "Invalid input: organization_id is required");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout("search exceeded 30s".to_string());
        assert_eq!(err.to_string(), "Timeout: search exceeded 30s");
    }

    #[test]
    fn test_error_display_cancelled() {
        let err = Error::Cancelled("ingestion job".to_string());
        assert_eq!(err.to_string(), "Cancelled: ingestion job");
    }

    #[test]
    fn test_error_display_request() {
        let err = Error::Request("network unreachable".to_string());
        assert_eq!(err.to_string(), "Request error: network unreachable");
    }

    #[test]
    fn test_error_display_internal() {
        let err = Error::Internal("unexpected state".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_provider_classification() {
        assert!(Error::Embedding("x".into()).is_provider());
        assert!(Error::Inference("x".into()).is_provider());
        assert!(!Error::Config("x".into()).is_provider());
        assert!(!Error::InvalidInput("x".into()).is_provider());
    }

    #[test]
    fn test_interrupted_classification() {
        assert!(Error::Timeout("x".into()).is_interrupted());
        assert!(Error::Cancelled("x".into()).is_interrupted());
        assert!(!Error::Job("x".into()).is_interrupted());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
