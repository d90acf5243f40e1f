//! Remote object keys.
//!
//! A key is a destination folder plus an object name. What the folder means
//! depends on the backend: a Drive folder id, a sub-directory of a local root,
//! or an S3 key prefix.
//!
//! # Examples
//!
//! ```
//! use docvault_storage::ObjectKey;
//!
//! let key = ObjectKey::new("nightly", "scheq_backup_2024-01-01T00-00-00.json").unwrap();
//! assert_eq!(key.to_string(), "nightly/scheq_backup_2024-01-01T00-00-00.json");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// Folder + name pair addressing one remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Destination folder (may be empty for the store root)
    pub folder: String,
    /// Object name, always a single path component
    pub name: String,
}

impl ObjectKey {
    /// Create a key, rejecting names that could escape the folder.
    pub fn new(folder: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let folder = folder.into();
        let name = name.into();

        if name.is_empty() || name == "." || name == ".." {
            return Err(StorageError::InvalidKey(format!("bad object name '{}'", name)));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(StorageError::InvalidKey(format!(
                "object name '{}' must not contain path separators",
                name
            )));
        }
        if folder.split('/').any(|part| part == "..") {
            return Err(StorageError::InvalidKey(format!(
                "folder '{}' must not contain '..'",
                folder
            )));
        }

        Ok(Self { folder, name })
    }

    /// Folder with surrounding slashes removed.
    pub fn folder_trimmed(&self) -> &str {
        self.folder.trim_matches('/')
    }

    /// Resolve this key under a local base directory.
    pub fn to_path_buf(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        for part in self.folder_trimmed().split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.push(&self.name);
        path
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let folder = self.folder_trimmed();
        if folder.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", folder, self.name)
        }
    }
}
