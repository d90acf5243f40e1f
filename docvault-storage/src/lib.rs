//! Remote storage destinations for docvault backups.
//!
//! Every destination implements [`RemoteStore`], so the backup core only ever
//! asks one question: "store these bytes under this name in this folder and
//! tell me the id you gave them".
//!
//! ```text
//!          ┌──────────────┐
//!          │   Uploader   │
//!          └──────┬───────┘
//!                 ▼
//!          ┌──────────────┐
//!          │ RemoteStore  │  ← unified trait
//!          └──────┬───────┘
//!     ┌───────────┼───────────┐
//!     ▼           ▼           ▼
//! ┌────────┐ ┌─────────┐ ┌────────┐
//! │ Local  │ │  Drive  │ │   S3   │
//! └────────┘ └────┬────┘ └────────┘
//!                 ▼
//!          ┌──────────────┐
//!          │ AuthSession  │  ← token load / refresh / consent
//!          └──────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use docvault_storage::{LocalStore, ObjectKey, RemoteStore};
//!
//! # async fn example() -> docvault_storage::Result<()> {
//! let store = LocalStore::new("./remote");
//! let key = ObjectKey::new("hourly", "scheq_backup_2024-01-01T00-00-00.json")?;
//! let id = store.put_bytes(&key, b"{}", "application/json").await?;
//! println!("stored as {}", id);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `s3` - Enable S3/object storage backend (requires `object_store`)
//! - `full` - Enable all features

pub mod auth;
mod drive;
mod error;
mod local;
mod path;
mod traits;

#[cfg(feature = "s3")]
mod s3;

pub use drive::DriveStore;
pub use error::{Result, StorageError};
pub use local::{write_new_file, LocalStore};
pub use path::ObjectKey;
pub use traits::{RemoteObjectId, RemoteStore};

#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Store};

// Re-export bytes for convenience
pub use bytes::Bytes;

use auth::{AuthSession, FileTokenStore, GoogleOAuth};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Destination configuration understood by [`create_store`].
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Directory tree on the local filesystem
    Local {
        /// Root directory; key folders become sub-directories
        path: PathBuf,
    },
    /// Google Drive, authorized through OAuth
    Drive {
        /// Application credentials (`credentials.json`)
        credentials_path: PathBuf,
        /// Persisted user token (`token.json`)
        token_path: PathBuf,
        /// How long the first-run consent listener waits
        callback_timeout: Duration,
    },
    /// S3-compatible object storage
    #[cfg(feature = "s3")]
    S3(S3Config),
}

/// Create a storage backend from configuration.
///
/// Drive credentials are read eagerly so a missing `credentials.json` is a
/// startup error rather than a failed upload an hour later.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn RemoteStore>> {
    match config {
        StoreConfig::Local { path } => Ok(Arc::new(LocalStore::new(path))),
        StoreConfig::Drive {
            credentials_path,
            token_path,
            callback_timeout,
        } => {
            let flow = GoogleOAuth::from_credentials_file(credentials_path)?
                .with_callback_timeout(*callback_timeout);
            let session = AuthSession::new(
                Arc::new(FileTokenStore::new(token_path)),
                Arc::new(flow),
            );
            Ok(Arc::new(DriveStore::new(Arc::new(session))))
        }
        #[cfg(feature = "s3")]
        StoreConfig::S3(s3_config) => Ok(Arc::new(S3Store::new(s3_config.clone())?)),
    }
}
