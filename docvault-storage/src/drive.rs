//! Google Drive backend.
//!
//! Uploads go through the Drive v3 multipart endpoint: one
//! `multipart/related` request carrying the JSON metadata (name, parent
//! folder) followed by the file content.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::auth::AuthSession;
use crate::error::{Result, StorageError};
use crate::path::ObjectKey;
use crate::traits::{RemoteObjectId, RemoteStore};

const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

#[derive(Debug, Deserialize)]
struct CreatedFile {
    #[serde(default)]
    id: String,
}

/// Google Drive storage backend.
pub struct DriveStore {
    client: reqwest::Client,
    session: Arc<AuthSession>,
    upload_url: String,
}

impl DriveStore {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            client: reqwest::Client::new(),
            session,
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
        }
    }

    /// Point uploads at a different endpoint (Drive emulators, tests).
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }
}

/// Assemble a `multipart/related` body: metadata part, then media part.
pub(crate) fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let metadata = metadata.to_string();
    let mut body = Vec::with_capacity(data.len() + metadata.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl RemoteStore for DriveStore {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put_object(
        &self,
        key: &ObjectKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<RemoteObjectId> {
        let token = self.session.access_token().await?;

        let folder = key.folder_trimmed();
        let metadata = if folder.is_empty() {
            serde_json::json!({ "name": key.name })
        } else {
            serde_json::json!({ "name": key.name, "parents": [folder] })
        };

        let boundary = format!("docvault-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, content_type, &data);

        debug!("Uploading {} bytes to Drive", data.len());
        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Next cycle re-runs refresh instead of reusing the rejected token.
                self.session.invalidate().await;
            }
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Drive rejected upload");
            return Err(StorageError::Upload {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreatedFile = response.json().await?;
        if created.id.is_empty() {
            return Err(StorageError::Backend(
                "Drive response did not include a file id".to_string(),
            ));
        }

        Ok(RemoteObjectId(created.id))
    }

    fn backend_name(&self) -> &'static str {
        "drive"
    }
}
