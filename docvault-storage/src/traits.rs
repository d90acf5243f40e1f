//! Core storage trait definitions.
//!
//! The `RemoteStore` trait is the only surface the backup core sees of a
//! remote destination (Google Drive, a local directory, S3).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::path::ObjectKey;

/// Identifier a remote store assigned to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteObjectId(pub String);

impl RemoteObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload target for finished backup artifacts.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the scheduler holds the store
/// behind an `Arc` for the lifetime of the process.
///
/// # Error Handling
///
/// Authorization problems surface as `StorageError::Auth`, rejected requests
/// as `StorageError::Upload`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a new object named `key.name` inside `key.folder`.
    ///
    /// Returns the identifier the backend assigned to the object.
    async fn put_object(&self, key: &ObjectKey, data: Bytes, content_type: &str)
        -> Result<RemoteObjectId>;

    /// Convenience wrapper copying a byte slice.
    async fn put_bytes(
        &self,
        key: &ObjectKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<RemoteObjectId> {
        self.put_object(key, Bytes::copy_from_slice(data), content_type)
            .await
    }

    /// Get a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;
}
