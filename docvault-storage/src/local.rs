//! Local filesystem store.
//!
//! Treats a directory (typically a mounted network share or a synced folder)
//! as the remote destination. Objects land at `base_path/folder/name`.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::{Result, StorageError};
use crate::path::ObjectKey;
use crate::traits::{RemoteObjectId, RemoteStore};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    /// Create a new local store rooted at `base_path`.
    ///
    /// Directories are created on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Get the base path for this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Write `data` to `target` through a sibling temp file, refusing to replace
/// an existing file. Readers never observe a partially written target.
pub fn write_new_file(target: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".docvault-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl RemoteStore for LocalStore {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put_object(
        &self,
        key: &ObjectKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<RemoteObjectId> {
        let fs_path = key.to_path_buf(&self.base_path);
        if fs::try_exists(&fs_path).await? {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        debug!("Writing {} bytes to {:?}", data.len(), fs_path);
        let target = fs_path.clone();
        tokio::task::spawn_blocking(move || write_new_file(&target, &data))
            .await
            .map_err(|e| StorageError::Backend(format!("write task failed: {}", e)))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
                _ => StorageError::Io(e),
            })?;

        Ok(RemoteObjectId(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
