//! Digest-keyed library records
//!
//! Records are sharded one file per digest value under `<cache-root>/cache/`.
//! Each line is `<repository>@<image-digest> <escaped-path>`, see
//! [`escape_path`](super::escape::escape_path).
//!
//! The store only grows. `add` rewrites the whole shard through a temp file
//! and an atomic rename. Locks cover single reads and writes only, so two
//! processes indexing into the same cache root can still lose updates.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::escape::{escape_path, unescape_path};
use crate::domain::{Digest, LibraryRecord, RecordLookup};

/// Store mapping a digest to the library records that produced it
pub struct DigestStore {
    dir: PathBuf,
}

impl DigestStore {
    /// Creates a store rooted at the given shard directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the store for a cache root
    pub fn for_cache_root(cache_root: &Path) -> Self {
        Self::new(cache_root.join("cache"))
    }

    /// Returns the shard directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the shard file for a digest value
    pub fn shard_path(&self, digest: &str) -> PathBuf {
        self.dir.join(digest)
    }

    /// Loads all records for a digest value, in insertion order.
    ///
    /// A missing shard yields an empty list. Malformed lines are skipped.
    pub fn load(&self, digest: &str) -> Result<Vec<LibraryRecord>> {
        let path = self.shard_path(digest);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open digest shard: {}", path.display()))
            }
        };

        file.lock_shared()
            .context("Failed to acquire read lock on digest shard")?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .with_context(|| format!("Failed to read digest shard: {}", path.display()))?;

        // Decoded per line so one bad line does not poison the shard
        let mut records = Vec::new();
        for (line_num, line) in content.split(|&b| b == b'\n').enumerate() {
            match std::str::from_utf8(line).ok().map(|l| (l, parse_line(l))) {
                Some((_, Some(record))) => records.push(record),
                Some((l, None)) if l.trim().is_empty() => {}
                _ => {
                    tracing::debug!(
                        shard = %path.display(),
                        line = line_num + 1,
                        "skipping malformed record line"
                    );
                }
            }
        }

        Ok(records)
    }

    /// Writes the full record list for a digest value (whole-shard rewrite)
    pub fn dump(&self, digest: &str, records: &[LibraryRecord]) -> Result<()> {
        let lines = records
            .iter()
            .map(format_line)
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        let path = self.shard_path(digest);
        let temp_path = self.dir.join(format!(".{}.tmp", digest));

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on digest shard")?;

            let mut writer = BufWriter::new(&file);
            for line in &lines {
                writeln!(writer, "{}", line).context("Failed to write record")?;
            }
            writer.flush().context("Failed to flush digest shard")?;
        }

        fs::rename(&temp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Appends a record unless an equal one is already stored.
    ///
    /// Returns true if the record was new.
    pub fn add(&self, digest: &str, record: LibraryRecord) -> Result<bool> {
        let mut records = self.load(digest)?;
        if records.contains(&record) {
            return Ok(false);
        }
        records.push(record);
        self.dump(digest, &records)?;
        Ok(true)
    }
}

impl RecordLookup for DigestStore {
    fn lookup(&self, digest: &Digest) -> Result<Vec<LibraryRecord>> {
        self.load(digest.value())
    }
}

/// Formats a record line; the image part is unescaped, so it must not
/// contain the field separator or `@` in the digest
fn format_line(record: &LibraryRecord) -> Result<String> {
    let fields_ok = !record.repository.is_empty()
        && !record.image_digest.is_empty()
        && !record.repository.contains(char::is_whitespace)
        && !record.image_digest.contains(char::is_whitespace)
        && !record.repository.contains('@');
    if !fields_ok {
        anyhow::bail!(
            "Cannot store record for image '{}@{}': repository and digest must be non-empty without whitespace",
            record.repository,
            record.image_digest
        );
    }

    Ok(format!(
        "{}@{} {}",
        record.repository,
        record.image_digest,
        escape_path(&record.path)
    ))
}

fn parse_line(line: &str) -> Option<LibraryRecord> {
    let line = line.trim_start_matches([' ', '\t']).trim_end_matches([' ', '\t', '\r']);
    let (image, path) = line.split_once(' ')?;
    let (repository, image_digest) = image.split_once('@')?;
    if repository.is_empty() || image_digest.is_empty() || path.is_empty() {
        return None;
    }
    let path = unescape_path(path).ok()?;
    Some(LibraryRecord::new(repository, image_digest, path))
}
