//! Fetcher configuration.
//!
//! All knobs are resolved once at process startup and handed to the loader at
//! construction time; nothing is read from ambient global state afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::binance::BASE_URL;

/// Configuration for an archive loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Root URL of the vendor archive, with a trailing slash.
    pub base_url: String,

    /// Local directory the vendor layout is mirrored into.
    pub store_dir: PathBuf,

    /// HTTP client timeout in seconds. The loader imposes no other deadline.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            store_dir: PathBuf::from("data"),
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(config)
    }

    /// Store directory made absolute against `base` when it is relative.
    pub fn resolved_store_dir(&self, base: &Path) -> PathBuf {
        if self.store_dir.is_absolute() {
            self.store_dir.clone()
        } else {
            base.join(&self.store_dir)
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
