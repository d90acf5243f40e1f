//! Local artifact → remote store.

use docvault_storage::{Bytes, ObjectKey, RemoteObjectId, RemoteStore};
use std::sync::Arc;
use tracing::{error, info};

use crate::artifact::Artifact;
use crate::error::{BackupError, Result};

/// Outcome of one upload.
pub type UploadResult = std::result::Result<RemoteObjectId, BackupError>;

pub const ARTIFACT_CONTENT_TYPE: &str = "application/json";

/// Copies finished artifacts to a [`RemoteStore`].
///
/// The local artifact is only read; it stays in place whether the upload
/// succeeds or not.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn RemoteStore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Upload `artifact` into `folder`, named after the artifact file.
    pub async fn upload(&self, artifact: &Artifact, folder: &str) -> UploadResult {
        match self.try_upload(artifact, folder).await {
            Ok(id) => {
                info!(
                    artifact = %artifact.name,
                    backend = self.store.backend_name(),
                    remote_id = %id,
                    "Upload complete"
                );
                Ok(id)
            }
            Err(e) => {
                error!(
                    artifact = %artifact.name,
                    backend = self.store.backend_name(),
                    kind = e.kind(),
                    error = %e,
                    "Upload failed"
                );
                Err(e)
            }
        }
    }

    async fn try_upload(&self, artifact: &Artifact, folder: &str) -> Result<RemoteObjectId> {
        let data = tokio::fs::read(&artifact.path).await?;
        let key = ObjectKey::new(folder, artifact.name.clone())?;
        let id = self
            .store
            .put_object(&key, Bytes::from(data), ARTIFACT_CONTENT_TYPE)
            .await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docvault_storage::LocalStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_to_local_store() {
        let dir = TempDir::new().unwrap();
        let artifact =
            Artifact::write_new(&dir.path().join("out"), "db", Utc::now(), b"{}").unwrap();
        let remote = dir.path().join("remote");

        let uploader = Uploader::new(Arc::new(LocalStore::new(&remote)));
        let id = uploader.upload(&artifact, "hourly").await.unwrap();

        assert_eq!(id.as_str(), format!("hourly/{}", artifact.name));
        assert_eq!(
            std::fs::read(remote.join("hourly").join(&artifact.name)).unwrap(),
            b"{}"
        );
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_io_error() {
        let dir = TempDir::new().unwrap();
        let artifact = Artifact {
            path: dir.path().join("gone.json"),
            name: "gone.json".to_string(),
            database: "db".to_string(),
            created_at: Utc::now(),
            size: 0,
        };

        let uploader = Uploader::new(Arc::new(LocalStore::new(dir.path().join("remote"))));
        let err = uploader.upload(&artifact, "").await.unwrap_err();
        assert!(matches!(err, BackupError::Io(_)));
    }

    #[tokio::test]
    async fn test_existing_remote_object_is_upload_error() {
        let dir = TempDir::new().unwrap();
        let artifact = Artifact::write_new(dir.path(), "db", Utc::now(), b"[]").unwrap();
        let uploader = Uploader::new(Arc::new(LocalStore::new(dir.path().join("remote"))));

        uploader.upload(&artifact, "f").await.unwrap();
        let err = uploader.upload(&artifact, "f").await.unwrap_err();
        assert!(matches!(err, BackupError::Upload(_)));
    }
}
