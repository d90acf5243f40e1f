//! Configuration management for docvault
//!
//! Default config location: ./docvault.toml. Every value has a default, so
//! a missing file is fine. `DOCVAULT_*` environment variables override the
//! file.

mod destination;

pub use destination::{
    DestinationConfig, DestinationKind, DriveDestinationConfig, LocalDestinationConfig,
    S3DestinationConfig,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "docvault.toml";

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Connection string of the document database
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_uri() -> String {
    "mongodb://localhost:27017/".to_string()
}

fn default_database() -> String {
    "scheq".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    /// Where artifacts are written before upload
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Wait between the end of one cycle and the start of the next
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_interval_secs() -> u64 {
    3600
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl BackupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// `EnvFilter` directive, used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,docvault=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Parse a TOML document without touching the environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.expand_paths()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file path, or fall back to defaults when it does not
    /// exist. Environment overrides are applied on top.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.expand_paths()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCVAULT_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOCVAULT_SOURCE_URI") {
            self.source.uri = v;
        }
        if let Some(v) = lookup("DOCVAULT_DATABASE") {
            self.source.database = v;
        }
        if let Some(v) = lookup("DOCVAULT_OUTPUT_DIR") {
            self.backup.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCVAULT_INTERVAL_SECS") {
            self.backup.interval_secs = v
                .trim()
                .parse()
                .map_err(|_| anyhow!("DOCVAULT_INTERVAL_SECS must be a whole number, got '{}'", v))?;
        }
        if let Some(v) = lookup("DOCVAULT_DESTINATION") {
            self.destination.kind = v.parse()?;
        }
        if let Some(v) = lookup("DOCVAULT_FOLDER") {
            self.destination.folder = v;
        }
        if let Some(v) = lookup("DOCVAULT_CREDENTIALS_PATH") {
            self.destination.drive.credentials_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCVAULT_TOKEN_PATH") {
            self.destination.drive.token_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCVAULT_LOCAL_PATH") {
            self.destination.local.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCVAULT_LOG_LEVEL") {
            self.observability.log_level = v;
        }
        if let Some(v) = lookup("DOCVAULT_LOG_FORMAT") {
            self.observability.log_format = v;
        }
        Ok(())
    }

    /// Expand ~ in all paths
    fn expand_paths(&mut self) -> Result<()> {
        self.backup.output_dir = expand_tilde(&self.backup.output_dir)?;
        self.destination.expand_paths()
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.database.trim().is_empty() {
            bail!("source.database must not be empty");
        }
        if self.source.uri.trim().is_empty() {
            bail!("source.uri must not be empty");
        }
        if self.backup.interval_secs == 0 {
            bail!("backup.interval_secs must be greater than zero");
        }
        match self.observability.log_format.as_str() {
            "pretty" | "json" => {}
            other => bail!("observability.log_format must be \"pretty\" or \"json\", got '{}'", other),
        }
        self.destination.validate()
    }
}
