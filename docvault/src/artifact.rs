//! Backup artifact naming and the final on-disk write.
//!
//! Artifacts are named `<database>_backup_<YYYY-MM-DDTHH-MM-SS>.json`. The
//! name depends only on the database name and a UTC timestamp at second
//! precision, so names sort lexically by creation time.

use chrono::{DateTime, SubsecRound, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Timestamp layout embedded in artifact names.
pub const ARTIFACT_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

const ARTIFACT_MARKER: &str = "_backup_";
const ARTIFACT_EXTENSION: &str = "json";

/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_database_name(database: &str) -> String {
    database
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Artifact file name for `database` at `at`. Sub-second precision is dropped.
pub fn artifact_name(database: &str, at: &DateTime<Utc>) -> String {
    format!(
        "{}{}{}.{}",
        sanitize_database_name(database),
        ARTIFACT_MARKER,
        at.format(ARTIFACT_TIME_FORMAT),
        ARTIFACT_EXTENSION
    )
}

/// A finished backup file in the output directory.
///
/// Once written an artifact is never modified; uploading only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub name: String,
    pub database: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

impl Artifact {
    /// Write `data` as a new artifact in `dir`.
    ///
    /// The bytes go to a temp file in `dir` which is synced and then moved
    /// into place. An existing artifact with the same name is never replaced;
    /// that case is an `AlreadyExists` I/O error.
    pub fn write_new(
        dir: &Path,
        database: &str,
        created_at: DateTime<Utc>,
        data: &[u8],
    ) -> Result<Self> {
        let created_at = created_at.trunc_subsecs(0);
        let name = artifact_name(database, &created_at);
        let path = dir.join(&name);

        docvault_storage::write_new_file(&path, data)?;

        Ok(Self {
            path,
            name,
            database: database.to_string(),
            created_at,
            size: data.len() as u64,
        })
    }
}
