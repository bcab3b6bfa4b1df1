//! Cache root management
//!
//! A cache root holds both persistent stores:
//!
//! ```text
//! <cache-root>/
//! ├── cache/
//! │   └── <digest>          # One shard per digest value
//! └── image_index.json      # Image identity -> tag history
//! ```
//!
//! Nothing is created until the first write.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{DigestStore, TagStore};

/// Summary of what a cache root holds
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Number of digest shards
    pub digests: usize,

    /// Number of images with recorded tags
    pub tagged_images: usize,
}

/// A directory holding a digest store and a tag store
pub struct CacheRoot {
    root: PathBuf,
}

impl CacheRoot {
    /// Opens a cache root; the directory does not need to exist yet
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if anything has been written here
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Returns the digest store
    pub fn digest_store(&self) -> DigestStore {
        DigestStore::for_cache_root(&self.root)
    }

    /// Returns the tag store
    pub fn tag_store(&self) -> TagStore {
        TagStore::for_cache_root(&self.root)
    }

    /// Counts shards and tagged images
    pub fn stats(&self) -> Result<CacheStats> {
        let digest_dir = self.digest_store().dir().to_path_buf();
        let digests = match fs::read_dir(&digest_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                .count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read digest directory: {}", digest_dir.display())
                })
            }
        };

        let tagged_images = self.tag_store().load()?.len();

        Ok(CacheStats {
            digests,
            tagged_images,
        })
    }
}
