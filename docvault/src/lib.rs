//! docvault: scheduled document-database backups
//!
//! Every cycle snapshots all collections of one database into a single JSON
//! artifact and uploads it to a remote store.
//!
//! ```text
//! Scheduler ──► Exporter ──► Artifact ──► Uploader ──► RemoteStore
//!                  │
//!                  ▼
//!           DocumentSource (MongoDB, memory)
//! ```
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB document source
//! - `storage-s3` - S3 / MinIO destination

pub mod artifact;
pub mod config;
pub mod document;
pub mod error;
pub mod exporter;
pub mod normalize;
pub mod scheduler;
pub mod serializer;
pub mod source;
pub mod uploader;

pub use artifact::{artifact_name, Artifact};
pub use config::Config;
pub use document::{Document, ObjectId, Snapshot, Value};
pub use error::{BackupError, Result};
pub use exporter::{ExportResult, ExportStats, Exporter};
pub use scheduler::{CycleReport, Scheduler, SchedulerState};
pub use uploader::{UploadResult, Uploader};
