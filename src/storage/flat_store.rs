//! Local flat key-value area
//!
//! Holds unindexed values under well-known keys: the legacy deck, the
//! favorites list, sync snapshots and the installation id. One file per key:
//! ```text
//! {data_dir}/kv/
//! ├── ll_srs_v1      # legacy deck / deck snapshot (JSON array)
//! ├── ll_favs_v1     # favorites (JSON array)
//! └── ll_uid         # per-installation id
//! ```
//! Writes go to a temp file first and are renamed into place, so a reader
//! sees either the old or the new value.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Key holding the per-installation id
pub const INSTALLATION_ID_KEY: &str = "ll_uid";

#[derive(Error, Debug)]
pub enum FlatStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, FlatStoreError>;

/// Storage manager for the flat key-value area
#[derive(Debug, Clone)]
pub struct FlatStore {
    root: PathBuf,
}

impl FlatStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if needed
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(FlatStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    /// Read the value under `key`
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the value under `key`
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key)?;
        self.init()?;

        let tmp = self.root.join(format!(".{}.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The opaque id scoping this installation's mirror data, generated on
    /// first use.
    pub fn installation_id(&self) -> Result<String> {
        if let Some(id) = self.get(INSTALLATION_ID_KEY)? {
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }

        let id = format!("u_{}", Uuid::new_v4().simple());
        self.set(INSTALLATION_ID_KEY, &id)?;
        log::info!("Generated installation id {}", id);
        Ok(id)
    }
}
