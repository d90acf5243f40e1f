//! Storage error types.

use std::io;
use thiserror::Error;

/// Storage operation errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error during storage operation
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Object already exists and will not be overwritten
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Invalid object key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Authorization could not be obtained or was rejected
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Remote store refused or failed the upload
    #[error("Upload failed (status {status}): {message}")]
    Upload { status: u16, message: String },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encode/decode failure (token files, API responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Object store error
    #[cfg(feature = "s3")]
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Check if this error came from the authorization layer.
    pub fn is_auth(&self) -> bool {
        matches!(self, StorageError::Auth(_))
            || matches!(self, StorageError::Upload { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth() {
        assert!(StorageError::Auth("expired".to_string()).is_auth());
        let forbidden = StorageError::Upload {
            status: 403,
            message: "insufficient permissions".to_string(),
        };
        assert!(forbidden.is_auth());
        let quota = StorageError::Upload {
            status: 507,
            message: "quota".to_string(),
        };
        assert!(!quota.is_auth());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::Upload {
            status: 500,
            message: "backend unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upload failed (status 500): backend unavailable"
        );
    }
}
