//! TOML configuration.
//!
//! Every field has a default, so a missing file (or a file with only some
//! sections) yields the stock setup: nine-day lookback, `AGH_sp500` file
//! prefix, the `agh_sp500` bucket in `northamerica-northeast1`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tradeday.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub download: DownloadConfig,
    pub gcs: GcsConfig,
    pub yahoo: YahooConfig,
}

/// Settings for the download loop and file naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of calendar days to look back, ending yesterday.
    pub lookback_days: u32,
    /// Stored files are named `<file_prefix>_YYYY-MM-DD.csv`.
    pub file_prefix: String,
}

/// Google Cloud Storage destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GcsConfig {
    pub project_id: String,
    pub bucket: String,
    /// Location used when the bucket has to be created.
    pub location: String,
    /// API root; point it at an emulator for local runs.
    pub base_url: String,
    /// Environment variable holding an OAuth2 access token.
    pub token_env: String,
}

/// Yahoo Finance chart API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YahooConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            lookback_days: 9,
            file_prefix: "AGH_sp500".into(),
        }
    }
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            project_id: "agh-ycgn288-sp500-project".into(),
            bucket: "agh_sp500".into(),
            location: "northamerica-northeast1".into(),
            base_url: "https://storage.googleapis.com".into(),
            token_env: "GCS_ACCESS_TOKEN".into(),
        }
    }
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".into(),
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `tradeday.toml` in the working
    /// directory is used when present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            log::debug!("loading config from {}", path.display());
            return Self::from_file(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            log::debug!("loading config from {}", fallback.display());
            return Self::from_file(fallback);
        }

        log::debug!("no config file, using defaults");
        Ok(Self::default())
    }
}
