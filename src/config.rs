//! Startup configuration for the storage engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::file::{DEFAULT_PAGE_SIZE, LINK_HEADER_SIZE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown replacement policy: {0}")]
    UnknownPolicy(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Page replacement policy used by the buffer manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// Evict the unpinned frame used least recently
    #[default]
    #[serde(rename = "LRU", alias = "lru")]
    Lru,
    /// Evict the unpinned frame used most recently
    #[serde(rename = "MRU", alias = "mru")]
    Mru,
}

impl FromStr for ReplacementPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(ReplacementPolicy::Lru),
            "MRU" => Ok(ReplacementPolicy::Mru),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementPolicy::Lru => write!(f, "LRU"),
            ReplacementPolicy::Mru => write!(f, "MRU"),
        }
    }
}

/// Immutable options supplied once at startup.
///
/// The JSON keys keep the historical names (`dbpath`, `pagesize`, ...) so
/// existing configuration files load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Directory holding the data files and the catalog
    #[serde(rename = "dbpath")]
    pub db_path: PathBuf,
    /// Page size in bytes
    #[serde(rename = "pagesize")]
    pub page_size: usize,
    /// Number of data file indices the disk manager accepts
    #[serde(rename = "dm_maxfilecount")]
    pub max_file_count: usize,
    /// Number of frames in the buffer pool
    #[serde(rename = "bm_buffercount")]
    pub buffer_count: usize,
    /// Initial replacement policy
    #[serde(rename = "bm_policy")]
    pub policy: ReplacementPolicy,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./BinData"),
            page_size: DEFAULT_PAGE_SIZE,
            max_file_count: 100,
            buffer_count: 100,
            policy: ReplacementPolicy::Lru,
        }
    }
}

impl DbConfig {
    /// Create a configuration with explicit values
    pub fn new<P: Into<PathBuf>>(
        db_path: P,
        page_size: usize,
        max_file_count: usize,
        buffer_count: usize,
        policy: ReplacementPolicy,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            page_size,
            max_file_count,
            buffer_count,
            policy,
        }
    }

    /// Load a configuration from a JSON file; absent keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: DbConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Check that the values describe a usable engine
    pub fn validate(&self) -> ConfigResult<()> {
        // Room for the link header plus at least one bytemap byte
        if self.page_size <= LINK_HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page size {} must exceed {} bytes",
                self.page_size, LINK_HEADER_SIZE
            )));
        }
        if self.page_size > i32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "page size {} is too large",
                self.page_size
            )));
        }
        if self.buffer_count == 0 {
            return Err(ConfigError::Invalid(
                "buffer pool needs at least one frame".to_string(),
            ));
        }
        if self.max_file_count == 0 {
            return Err(ConfigError::Invalid(
                "at least one data file is required".to_string(),
            ));
        }
        Ok(())
    }
}
