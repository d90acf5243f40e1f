//! OAuth tokens and their persistence.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// Tokens older than this margin before expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Access/refresh token pair as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token stops being accepted. `None` means no known expiry.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthToken {
    /// True when the access token can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|r| !r.is_empty())
    }
}

/// Persistence for the process-wide token.
///
/// Implementations are called only from inside [`super::AuthSession`], which
/// serializes access, so a store never sees concurrent writers.
pub trait TokenStore: Send + Sync {
    /// Load the persisted token, `Ok(None)` if nothing was saved yet.
    fn load(&self) -> Result<Option<OAuthToken>>;

    /// Replace the persisted token.
    fn save(&self, token: &OAuthToken) -> Result<()>;
}

/// JSON token file (`token.json`), readable only by the owner.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<OAuthToken>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let token: OAuthToken = serde_json::from_str(&contents).map_err(|e| {
            StorageError::Auth(format!("corrupt token file {}: {}", self.path.display(), e))
        })?;
        Ok(Some(token))
    }

    fn save(&self, token: &OAuthToken) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let contents = serde_json::to_string_pretty(token)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        std::io::Write::write_all(&mut tmp, contents.as_bytes())?;

        // Set file permissions to 0600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

/// In-process token store, used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<OAuthToken>>,
    saves: Mutex<usize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: OAuthToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
            saves: Mutex::new(0),
        }
    }

    /// Number of times `save` was called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    pub fn current(&self) -> Option<OAuthToken> {
        self.token.lock().clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<OAuthToken>> {
        Ok(self.token.lock().clone())
    }

    fn save(&self, token: &OAuthToken) -> Result<()> {
        *self.token.lock() = Some(token.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
