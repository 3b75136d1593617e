//! Path management for gdchat configuration and data files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/gdchat/              # Config directory
//! ├── config.toml                # Application configuration
//! └── secret.json                # API key
//!
//! ~/.local/share/gdchat/         # Data directory
//! ├── store/                     # Key-value files (history, last send time)
//! ├── exports/                   # Exported transcripts
//! └── logs/                      # Application logs
//!     └── gdchat.log.YYYY-MM-DD
//! ```

use gdchat_core::error::{ChatError, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "gdchat";

/// Resolved config and data roots.
///
/// Both roots default to the platform directories from `dirs` and can be
/// overridden individually (command-line flags, tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdchatPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl GdchatPaths {
    /// Resolves both roots, preferring the given overrides.
    pub fn resolve(config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => dirs::config_dir()
                .ok_or_else(|| ChatError::config("Cannot find config directory"))?
                .join(APP_DIR),
        };
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .ok_or_else(|| ChatError::config("Cannot find data directory"))?
                .join(APP_DIR),
        };
        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Places everything under one directory.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path to the secrets file.
    ///
    /// # Security Note
    ///
    /// Keep this file readable by the owner only (600).
    pub fn secret_file(&self) -> PathBuf {
        self.config_dir.join("secret.json")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
