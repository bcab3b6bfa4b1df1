//! # Storage Layer
//!
//! Persistence for the library index, as plain files under a cache root.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Library records | One line per record, one file per digest | `<cache-root>/cache/{digest}` |
//! | Tag history | JSON object | `<cache-root>/image_index.json` |
//! | Config | TOML | `~/.config/extract-lib/config.toml` |
//!
//! ## Concurrency
//!
//! Each store operation reads the relevant file whole, changes it in
//! memory and rewrites it (temp file + rename). File locks (`fs2`) cover a
//! single read or write, not the read-modify-write cycle, so at most one
//! indexing process should write to a cache root at a time.
//!
//! ## Key Types
//!
//! - [`CacheRoot`] - Entry point for the stores under one directory
//! - [`DigestStore`] - Digest -> library records
//! - [`TagStore`] - Image identity -> tag history
//! - [`Config`] - User configuration

mod cache_root;
mod config;
mod digest_store;
mod escape;
mod tag_store;

pub use cache_root::{CacheRoot, CacheStats};
pub use config::{Config, ConfigError, IndexConfig, ResolveConfig};
pub use digest_store::DigestStore;
pub use escape::{escape_path, unescape_path, EscapeError};
pub use tag_store::{TagIndex, TagStore};
