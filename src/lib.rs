//! preplib - locate the container image that shipped a set of libraries
//!
//! preplib keeps a persistent index from library digests (content hashes and
//! GNU build IDs) to the images and paths they were observed in. Given a few
//! library files or digests, it finds the single image consistent with all
//! of them, e.g. to fetch a matching loader for a CTF challenge binary.

pub mod cli;
pub mod digest;
pub mod domain;
pub mod index;
pub mod storage;

pub use domain::{
    resolve, Digest, DigestMethod, ImageIdentity, ImageName, LibraryRecord, MethodPriority,
    QueryArtifact, Resolution, ResolveOutcome,
};
pub use index::{IndexReport, Indexer};
pub use storage::{CacheRoot, DigestStore, TagStore};
