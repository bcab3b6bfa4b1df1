//! Image indexing
//!
//! Writes one image's libraries into the digest store and its tag into the
//! tag store. For every requested method the digests come from a
//! [`DigestSource`]; a method whose computation fails is skipped for this
//! image without affecting the others.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::digest::DigestSource;
use crate::domain::{Digest, DigestMethod, ImageIdentity, ImageName, LibraryRecord};
use crate::storage::{CacheRoot, DigestStore, TagStore};

/// Extra tags derived from a date-pinned tag such as `jammy-20250530`.
///
/// The codename (`jammy`) is always derived; the table can map a codename
/// to a version tag (`jammy -> 22.04`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAliases {
    versions: BTreeMap<String, String>,
}

impl TagAliases {
    pub fn new(versions: BTreeMap<String, String>) -> Self {
        Self { versions }
    }

    /// Returns the tags to record for `tag`, starting with `tag` itself
    pub fn expand(&self, tag: &str) -> Vec<String> {
        let mut tags = vec![tag.to_string()];
        if let Some(codename) = date_pinned_codename(tag) {
            tags.push(codename.to_string());
            if let Some(version) = self.versions.get(codename) {
                tags.push(version.clone());
            }
        }
        tags
    }
}

/// Returns the codename of a `<codename>-<date>` tag
pub fn date_pinned_codename(tag: &str) -> Option<&str> {
    let (codename, date) = tag.split_once('-')?;
    let is_word = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    (is_word(codename) && is_word(date) && date.starts_with(|c: char| c.is_ascii_digit()))
        .then_some(codename)
}

/// What happened to one digest method while indexing an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResult {
    /// Digests were computed and stored
    Indexed { digests: usize, new_records: usize },

    /// Digest computation failed; nothing was stored for this method
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodReport {
    pub method: DigestMethod,
    #[serde(flatten)]
    pub result: MethodResult,
}

/// Summary of one `index_image` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub image: ImageIdentity,
    pub tags: Vec<String>,
    pub methods: Vec<MethodReport>,
}

impl IndexReport {
    /// Total records that were not already in the store
    pub fn new_records(&self) -> usize {
        self.methods
            .iter()
            .map(|m| match m.result {
                MethodResult::Indexed { new_records, .. } => new_records,
                MethodResult::Skipped { .. } => 0,
            })
            .sum()
    }
}

/// Populates the digest and tag stores from one image
pub struct Indexer {
    digests: DigestStore,
    tags: TagStore,
    aliases: Option<TagAliases>,
}

impl Indexer {
    pub fn new(digests: DigestStore, tags: TagStore) -> Self {
        Self {
            digests,
            tags,
            aliases: None,
        }
    }

    /// Creates an indexer writing into a cache root
    pub fn for_cache_root(cache: &CacheRoot) -> Self {
        Self::new(cache.digest_store(), cache.tag_store())
    }

    /// Also record codename and version tags for date-pinned tags
    pub fn with_aliases(mut self, aliases: TagAliases) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Indexes the libraries of one image.
    ///
    /// The image reference must pin a content digest. If it also carries a
    /// tag, that tag is appended to the image's tag history.
    pub fn index_image(
        &self,
        image: &ImageName,
        library_paths: &[String],
        methods: &[DigestMethod],
        source: &impl DigestSource,
    ) -> Result<IndexReport> {
        let identity = image.identity()?;

        let tags = match (&image.tag, &self.aliases) {
            (Some(tag), Some(aliases)) => aliases.expand(tag),
            (Some(tag), None) => vec![tag.clone()],
            (None, _) => Vec::new(),
        };
        for tag in &tags {
            self.tags.add(&identity, tag)?;
        }

        let mut reports = Vec::with_capacity(methods.len());
        for &method in methods {
            let result = match source.digests(method, library_paths) {
                Ok(digests) => {
                    let mut stored = 0;
                    let mut new_records = 0;
                    for lib in digests {
                        let digest = match Digest::new(method, &lib.digest) {
                            Ok(digest) => digest,
                            Err(e) => {
                                tracing::debug!(path = %lib.path, error = %e, "ignoring invalid digest");
                                continue;
                            }
                        };
                        tracing::debug!(path = %lib.path, %digest, "indexing library");
                        let record = LibraryRecord::for_image(&identity, lib.path);
                        if self.digests.add(digest.value(), record)? {
                            new_records += 1;
                        }
                        stored += 1;
                    }
                    MethodResult::Indexed {
                        digests: stored,
                        new_records,
                    }
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::warn!(%method, image = %identity, error = %reason, "digest computation failed; skipping method");
                    MethodResult::Skipped { reason }
                }
            };
            reports.push(MethodReport { method, result });
        }

        Ok(IndexReport {
            image: identity,
            tags,
            methods: reports,
        })
    }
}
