//! S3-compatible destination (AWS, MinIO, ...), built on `object_store`.
//!
//! Objects land at `<prefix>/<folder>/<name>`. An object that already exists
//! under that key is never replaced.
//!
//! ```toml
//! [destination.s3]
//! bucket = "db-backups"
//! region = "us-east-1"
//! endpoint = "http://localhost:9000"   # MinIO
//! force_path_style = true
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Result, StorageError};
use crate::path::ObjectKey;
use crate::traits::{RemoteObjectId, RemoteStore};

/// Bucket location and credentials.
///
/// Without explicit keys the usual AWS environment / profile chain applies.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub prefix: Option<String>,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
}

impl S3Config {
    pub fn aws(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            prefix: None,
            endpoint: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            allow_http: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }
}

#[derive(Clone)]
pub struct S3Store {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl S3Store {
    pub fn new(config: S3Config) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_allow_http(config.allow_http)
            .with_virtual_hosted_style_request(!config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.with_access_key_id(id).with_secret_access_key(secret);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(format!("invalid S3 destination: {}", e)))?;
        Ok(Self::from_store(Arc::new(store), config.prefix.unwrap_or_default()))
    }

    /// Wrap any `object_store` backend, e.g. `InMemory` in tests.
    pub fn from_store(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &ObjectKey) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(key.to_string())
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix, key))
        }
    }
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").field("prefix", &self.prefix).finish()
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put_object(
        &self,
        key: &ObjectKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<RemoteObjectId> {
        let path = self.object_path(key);

        match self.store.head(&path).await {
            Ok(_) => return Err(StorageError::AlreadyExists(path.to_string())),
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        debug!(path = %path, "Putting object");
        self.store.put(&path, data.into()).await?;
        Ok(RemoteObjectId(path.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn key() -> ObjectKey {
        ObjectKey::new("hourly", "db_backup.json").unwrap()
    }

    #[test]
    fn test_config_builders() {
        let config = S3Config::aws("bucket", "eu-north-1")
            .with_prefix("mongo")
            .with_credentials("id", "secret");
        assert_eq!(config.region, "eu-north-1");
        assert_eq!(config.prefix.as_deref(), Some("mongo"));
        assert_eq!(config.secret_access_key.as_deref(), Some("secret"));
        assert!(!config.allow_http);
    }

    #[tokio::test]
    async fn test_put_under_prefix() {
        let memory = Arc::new(InMemory::new());
        let store = S3Store::from_store(memory.clone(), "/mongo/");

        let id = store
            .put_object(&key(), Bytes::from("{}"), "application/json")
            .await
            .unwrap();
        assert_eq!(id.as_str(), "mongo/hourly/db_backup.json");

        let stored = memory
            .get(&ObjectPath::from("mongo/hourly/db_backup.json"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored, Bytes::from("{}"));
    }

    #[tokio::test]
    async fn test_existing_object_is_kept() {
        let memory = Arc::new(InMemory::new());
        let store = S3Store::from_store(memory.clone(), "");

        store
            .put_object(&key(), Bytes::from("first"), "application/json")
            .await
            .unwrap();
        let err = store
            .put_object(&key(), Bytes::from("second"), "application/json")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let stored = memory
            .get(&ObjectPath::from("hourly/db_backup.json"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored, Bytes::from("first"));
    }
}
