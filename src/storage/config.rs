//! Configuration handling for preplib
//!
//! Configuration is stored in `~/.config/extract-lib/config.toml` (or the
//! platform equivalent). Every field is optional.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DigestMethod, MethodPriority};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Settings for `preplib index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Digest methods computed for every indexed library
    pub methods: Vec<DigestMethod>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            methods: vec![DigestMethod::BuildId, DigestMethod::Md5],
        }
    }
}

/// Settings for `preplib resolve`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Digest methods to try, highest priority first
    pub order: Vec<DigestMethod>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            order: MethodPriority::default().steps().to_vec(),
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache root holding the digest and tag stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Indexing settings
    pub index: IndexConfig,

    /// Resolution settings
    pub resolve: ResolveConfig,

    /// Extra tags recorded for a release codename (e.g., `jammy = "22.04"`)
    pub aliases: BTreeMap<String, String>,
}

impl Config {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "extract-lib")
    }

    /// Returns the default config file location
    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Returns the user cache directory used when no cache root is configured
    pub fn default_cache_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
    }

    /// Loads configuration from a file; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.index.methods.is_empty() {
            return Err(ConfigError::Invalid(
                "index.methods must name at least one digest method".to_string(),
            ));
        }
        if self.resolve.order.is_empty() {
            return Err(ConfigError::Invalid(
                "resolve.order must name at least one digest method".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the resolver's method priority
    pub fn priority(&self) -> Result<MethodPriority> {
        MethodPriority::new(self.resolve.order.iter().copied())
            .map_err(|e| ConfigError::Invalid(e.to_string()).into())
    }

    /// Picks the cache root: explicit override, then config, then user cache dir
    pub fn cache_root(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.cache_dir.clone())
            .or_else(Self::default_cache_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory; pass --cache-dir"))
    }
}
