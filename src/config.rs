//! Application configuration (`config.toml`)
//!
//! ```toml
//! data_dir = "/home/me/.local/share/lingualab"
//! legacy_deck_key = "ll_srs_v1"
//! favorites_key = "ll_favs_v1"
//! default_src = "auto"
//! default_dst = "pt"
//! due_limit = 50
//!
//! [sync]
//! enabled = true
//! base_url = "https://sync.example.workers.dev"
//! timeout_secs = 5
//! ```
//!
//! Every field is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::favorites::FAVORITES_KEY;
use crate::sync::SyncConfig;

/// Flat-store key of the legacy deck, also used for the deck snapshot
pub const LEGACY_DECK_KEY: &str = "ll_srs_v1";

/// File name of the card database inside the data dir
pub const CARDS_DB_FILE: &str = "cards.db";

/// Name of the flat store directory inside the data dir
pub const FLAT_STORE_DIR: &str = "kv";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where `cards.db` and the flat store live; platform default when unset
    pub data_dir: Option<PathBuf>,
    pub legacy_deck_key: String,
    pub favorites_key: String,
    /// Source language for new cards when none is given
    pub default_src: String,
    pub default_dst: String,
    /// Default size of the due queue
    pub due_limit: usize,
    pub sync: SyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            legacy_deck_key: LEGACY_DECK_KEY.to_string(),
            favorites_key: FAVORITES_KEY.to_string(),
            default_src: "auto".to_string(),
            default_dst: "pt".to_string(),
            due_limit: 50,
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("lingualab"))
            .ok_or(ConfigError::DataDirNotFound)
    }

    /// Get the default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lingualab").join("config.toml"))
    }

    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The configured data dir, or the platform default
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_dir(),
        }
    }

    pub fn cards_db_path(&self) -> Result<PathBuf> {
        Ok(self.resolved_data_dir()?.join(CARDS_DB_FILE))
    }

    pub fn flat_store_dir(&self) -> Result<PathBuf> {
        Ok(self.resolved_data_dir()?.join(FLAT_STORE_DIR))
    }
}
