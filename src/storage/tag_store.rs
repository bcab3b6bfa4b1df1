//! Image tag history
//!
//! Tags are stored in `<cache-root>/image_index.json` as a JSON object
//! mapping each image identity to every tag it was indexed under.
//!
//! Tags are not deduplicated: indexing the same tag twice records it twice.
//! A file that fails to parse is moved aside to `image_index.json.corrupt`
//! and the history starts over empty.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use crate::domain::ImageIdentity;

/// Mapping from image identity string to its tag history
pub type TagIndex = BTreeMap<String, Vec<String>>;

/// Store for image tag history in JSON format
pub struct TagStore {
    path: PathBuf,
}

impl TagStore {
    /// Creates a new tag store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the store for a cache root
    pub fn for_cache_root(cache_root: &Path) -> Self {
        Self::new(cache_root.join("image_index.json"))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns where a corrupt store file is moved
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    /// Loads the full tag index.
    ///
    /// A missing file yields an empty index. A corrupt file is quarantined
    /// and also yields an empty index.
    pub fn load(&self) -> Result<TagIndex> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TagIndex::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open tag index: {}", self.path.display()))
            }
        };

        file.lock_shared()
            .context("Failed to acquire read lock on tag index")?;

        // Invalid UTF-8 counts as corruption too
        let mut content = String::new();
        let parsed: Result<TagIndex> = match file.read_to_string(&mut content) {
            Ok(_) => serde_json::from_str(&content).map_err(anyhow::Error::from),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(e.into()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read tag index: {}", self.path.display()))
            }
        };
        drop(file);

        match parsed {
            Ok(index) => Ok(index),
            Err(e) => {
                let quarantine = self.quarantine_path();
                tracing::warn!(
                    path = %self.path.display(),
                    moved_to = %quarantine.display(),
                    error = %e,
                    "tag index is corrupt; starting with an empty tag history"
                );
                fs::rename(&self.path, &quarantine).with_context(|| {
                    format!(
                        "Failed to quarantine corrupt tag index {}",
                        self.path.display()
                    )
                })?;
                Ok(TagIndex::new())
            }
        }
    }

    /// Writes the full tag index (full rewrite)
    pub fn dump(&self, index: &TagIndex) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on tag index")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer(&mut writer, index).context("Failed to serialize tag index")?;
            writer.flush().context("Failed to flush tag index")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Returns the tags recorded for an image, oldest first
    pub fn get(&self, image: &ImageIdentity) -> Result<Vec<String>> {
        Ok(self.load()?.remove(&image.to_string()).unwrap_or_default())
    }

    /// Appends a tag to an image's history (no deduplication)
    pub fn add(&self, image: &ImageIdentity, tag: &str) -> Result<()> {
        let mut index = self.load()?;
        index
            .entry(image.to_string())
            .or_default()
            .push(tag.to_string());
        self.dump(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image() -> ImageIdentity {
        ImageIdentity::new("ubuntu", "sha256:0123")
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());

        assert!(store.load().unwrap().is_empty());
        assert!(store.get(&image()).unwrap().is_empty());
    }

    #[test]
    fn add_and_get() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());

        store.add(&image(), "jammy-20250530").unwrap();
        store.add(&image(), "jammy").unwrap();

        assert_eq!(store.get(&image()).unwrap(), vec!["jammy-20250530", "jammy"]);
    }

    #[test]
    fn repeated_tag_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());

        store.add(&image(), "jammy").unwrap();
        store.add(&image(), "jammy").unwrap();

        assert_eq!(store.get(&image()).unwrap(), vec!["jammy", "jammy"]);
    }

    #[test]
    fn file_is_identity_to_tags_object() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());

        store.add(&image(), "noble").unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json, serde_json::json!({ "ubuntu@sha256:0123": ["noble"] }));
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());
        assert_eq!(
            fs::read_to_string(store.quarantine_path()).unwrap(),
            "{ not json"
        );
        assert!(store.quarantine_path().ends_with("image_index.json.corrupt"));
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());
        fs::write(store.path(), r#"{"ubuntu@sha256:0123": "jammy"}"#).unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(store.quarantine_path().exists());
    }

    #[test]
    fn index_rebuilds_after_quarantine() {
        let dir = TempDir::new().unwrap();
        let store = TagStore::for_cache_root(dir.path());
        fs::write(store.path(), [0xff, 0xfe]).unwrap();

        store.add(&image(), "focal").unwrap();

        assert_eq!(store.get(&image()).unwrap(), vec!["focal"]);
        assert!(store.quarantine_path().exists());
    }
}
