//! Upload destination configuration.
//!
//! # Configuration Examples
//!
//! ## Google Drive (Default)
//!
//! ```toml
//! [destination]
//! kind = "drive"
//! folder = "1AbCdEfGhIjKlMnOp"   # Drive folder id
//!
//! [destination.drive]
//! credentials_path = "credentials.json"
//! token_path = "token.json"
//! ```
//!
//! ## Local Directory
//!
//! ```toml
//! [destination]
//! kind = "local"
//! folder = "hourly"
//!
//! [destination.local]
//! path = "/mnt/nas/backups"
//! ```
//!
//! ## S3 / MinIO
//!
//! ```toml
//! [destination]
//! kind = "s3"
//! folder = "mongo"
//!
//! [destination.s3]
//! bucket = "db-backups"
//! region = "us-east-1"
//! endpoint = "http://localhost:9000"
//! force_path_style = true
//! ```

use anyhow::{anyhow, bail, Result};
use docvault_storage::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::expand_tilde;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    Drive,
    Local,
    S3,
}

impl FromStr for DestinationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drive" => Ok(Self::Drive),
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(anyhow!(
                "unknown destination kind '{}' (expected drive, local or s3)",
                other
            )),
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Drive => "drive",
            Self::Local => "local",
            Self::S3 => "s3",
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DestinationConfig {
    #[serde(default)]
    pub kind: DestinationKind,
    /// Drive folder id, sub-directory, or key prefix, depending on `kind`
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub drive: DriveDestinationConfig,
    #[serde(default)]
    pub local: LocalDestinationConfig,
    #[serde(default)]
    pub s3: Option<S3DestinationConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveDestinationConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// How long the first-run consent listener waits for the browser
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_callback_timeout() -> u64 {
    300
}

impl Default for DriveDestinationConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            callback_timeout_secs: default_callback_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalDestinationConfig {
    #[serde(default = "default_local_path")]
    pub path: PathBuf,
}

fn default_local_path() -> PathBuf {
    PathBuf::from("./remote")
}

impl Default for LocalDestinationConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

/// S3-compatible storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3DestinationConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Optional prefix in front of `folder`
    #[serde(default)]
    pub prefix: Option<String>,
    /// Custom endpoint (for MinIO, etc.)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Falls back to the AWS credential chain when unset
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl DestinationConfig {
    pub(crate) fn expand_paths(&mut self) -> Result<()> {
        self.drive.credentials_path = expand_tilde(&self.drive.credentials_path)?;
        self.drive.token_path = expand_tilde(&self.drive.token_path)?;
        self.local.path = expand_tilde(&self.local.path)?;
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.kind == DestinationKind::Drive && self.drive.callback_timeout_secs == 0 {
            bail!("destination.drive.callback_timeout_secs must be greater than zero");
        }
        if self.kind == DestinationKind::S3 && self.s3.is_none() {
            bail!("destination.kind = \"s3\" requires a [destination.s3] section");
        }
        Ok(())
    }

    /// Translate into the storage crate's backend description.
    pub fn to_store_config(&self) -> Result<StoreConfig> {
        match self.kind {
            DestinationKind::Drive => Ok(StoreConfig::Drive {
                credentials_path: self.drive.credentials_path.clone(),
                token_path: self.drive.token_path.clone(),
                callback_timeout: Duration::from_secs(self.drive.callback_timeout_secs),
            }),
            DestinationKind::Local => Ok(StoreConfig::Local {
                path: self.local.path.clone(),
            }),
            DestinationKind::S3 => self.s3_store_config(),
        }
    }

    #[cfg(feature = "storage-s3")]
    fn s3_store_config(&self) -> Result<StoreConfig> {
        let s3 = self
            .s3
            .as_ref()
            .ok_or_else(|| anyhow!("missing [destination.s3] section"))?;

        let mut config = docvault_storage::S3Config::aws(&s3.bucket, &s3.region);
        config.endpoint = s3.endpoint.clone();
        config.force_path_style = s3.force_path_style;
        config.allow_http = s3
            .endpoint
            .as_deref()
            .is_some_and(|e| e.starts_with("http://"));
        if let Some(prefix) = &s3.prefix {
            config = config.with_prefix(prefix);
        }
        if let (Some(key), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
            config = config.with_credentials(key, secret);
        }
        Ok(StoreConfig::S3(config))
    }

    #[cfg(not(feature = "storage-s3"))]
    fn s3_store_config(&self) -> Result<StoreConfig> {
        Err(anyhow!(
            "S3 destination requires the 'storage-s3' feature"
        ))
    }
}
