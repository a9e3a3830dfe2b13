//! Configuration management for credvault
//!
//! Read from `~/.config/credvault/config.json` (or `$CREDVAULT_CONFIG`).
//! A missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Which encryption backend holds the credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// age-encrypted files managed by credvault itself
    #[default]
    Age,
    /// The `pass` password manager (gpg)
    Pass,
}

/// credvault configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Encryption backend to use
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory for the age backend (defaults to the data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Subdirectory of the password store used by the pass backend
    #[serde(default = "default_pass_prefix")]
    pub pass_prefix: String,

    /// Longest directory name the path encoder may produce
    #[serde(default = "default_max_segment_len")]
    pub max_segment_len: usize,
}

fn default_pass_prefix() -> String {
    "docker-credential-helpers".to_string()
}

// encrypted ext4 caps names at 143 bytes; keep room for backend suffixes
fn default_max_segment_len() -> usize {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            store_dir: None,
            pass_prefix: default_pass_prefix(),
            max_segment_len: default_max_segment_len(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load_default() -> Result<Self> {
        Self::load(&Paths::new().config_file())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Root directory of the age backend
    pub fn store_dir(&self, paths: &Paths) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| paths.store_dir())
    }
}
