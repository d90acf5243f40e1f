use docvault_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Value of type '{type_name}' cannot be written to a backup")]
    UnsupportedType { type_name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;

impl BackupError {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        BackupError::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Short machine-friendly label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            BackupError::Connection(_) => "connection",
            BackupError::Auth(_) => "auth",
            BackupError::UnsupportedType { .. } => "unsupported_type",
            BackupError::Io(_) => "io",
            BackupError::Upload(_) => "upload",
            BackupError::Serialization(_) => "serialization",
            BackupError::Config(_) => "config",
        }
    }
}

impl From<StorageError> for BackupError {
    fn from(err: StorageError) -> Self {
        if err.is_auth() {
            return BackupError::Auth(err.to_string());
        }
        match err {
            StorageError::Io(e) => BackupError::Io(e),
            StorageError::Config(msg) => BackupError::Config(msg),
            other => BackupError::Upload(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_names_type() {
        let err = BackupError::unsupported("binary");
        assert_eq!(
            err.to_string(),
            "Value of type 'binary' cannot be written to a backup"
        );
        assert_eq!(err.kind(), "unsupported_type");
    }

    #[test]
    fn test_storage_error_mapping() {
        let auth: BackupError = StorageError::Auth("expired".to_string()).into();
        assert!(matches!(auth, BackupError::Auth(_)));

        let forbidden: BackupError = StorageError::Upload {
            status: 401,
            message: "bad token".to_string(),
        }
        .into();
        assert!(matches!(forbidden, BackupError::Auth(_)));

        let quota: BackupError = StorageError::Upload {
            status: 403,
            message: "quota".to_string(),
        }
        .into();
        // 403 counts as an auth problem on the storage side too
        assert!(matches!(quota, BackupError::Auth(_)));

        let server: BackupError = StorageError::Upload {
            status: 500,
            message: "oops".to_string(),
        }
        .into();
        assert!(matches!(server, BackupError::Upload(_)));

        let io: BackupError =
            StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).into();
        assert!(matches!(io, BackupError::Io(_)));
    }
}
