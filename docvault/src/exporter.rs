//! Database → local artifact.
//!
//! One export reads every collection, normalizes each document, serializes
//! the snapshot and writes it as a new artifact. Every failure is logged and
//! returned; nothing is left half-written in the output directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::artifact::Artifact;
use crate::document::Snapshot;
use crate::error::{BackupError, Result};
use crate::normalize::normalize_document;
use crate::serializer::serialize_snapshot;
use crate::source::DocumentSource;

/// Outcome of one export.
pub type ExportResult = std::result::Result<Artifact, BackupError>;

/// Clock used to stamp artifacts.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counters from a successful export.
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    /// (collection, document count) in export order
    pub collections: Vec<(String, usize)>,
    pub documents: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

pub struct Exporter {
    source: Arc<dyn DocumentSource>,
    database: String,
    output_dir: PathBuf,
    clock: Clock,
}

impl Exporter {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        database: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            database: database.into(),
            output_dir: output_dir.into(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to pin artifact names in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export the database to a new artifact.
    pub async fn export(&self) -> ExportResult {
        self.export_with_stats().await.map(|(artifact, _)| artifact)
    }

    /// Like [`Exporter::export`], also returning counters.
    pub async fn export_with_stats(&self) -> Result<(Artifact, ExportStats)> {
        let started = Instant::now();
        match self.try_export(started).await {
            Ok((artifact, stats)) => {
                info!(
                    database = %self.database,
                    artifact = %artifact.name,
                    collections = stats.collections.len(),
                    documents = stats.documents,
                    bytes = stats.bytes,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    "Export complete"
                );
                Ok((artifact, stats))
            }
            Err(e) => {
                error!(
                    database = %self.database,
                    kind = e.kind(),
                    error = %e,
                    "Export failed"
                );
                Err(e)
            }
        }
    }

    async fn try_export(&self, started: Instant) -> Result<(Artifact, ExportStats)> {
        let created_at = (self.clock)();
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut reader = self.source.open(&self.database).await?;
        let names = reader.list_collection_names().await?;
        debug!(
            database = %self.database,
            source = self.source.source_name(),
            "Found {} collections",
            names.len()
        );

        let mut snapshot = Snapshot::new(self.database.clone());
        let mut stats = ExportStats::default();
        for name in names {
            let mut documents = reader.read_all(&name).await?;
            documents.iter_mut().for_each(normalize_document);

            debug!(collection = %name, documents = documents.len(), "Read collection");
            stats.documents += documents.len();
            stats.collections.push((name.clone(), documents.len()));
            snapshot.push_collection(name, documents);
        }
        drop(reader);

        let dir = self.output_dir.clone();
        let database = self.database.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            let bytes = serialize_snapshot(snapshot)?;
            Artifact::write_new(&dir, &database, created_at, &bytes)
        })
        .await
        .map_err(|e| match e.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(e) => BackupError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)),
        })??;

        stats.bytes = artifact.size;
        stats.elapsed = started.elapsed();
        Ok((artifact, stats))
    }
}
