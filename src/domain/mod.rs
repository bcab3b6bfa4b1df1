//! Domain models for preplib
//!
//! Contains the core types and the resolution algorithm without any I/O
//! concerns. Record lookups go through the [`RecordLookup`] trait.

mod digest;
mod image;
mod library;
mod resolve;

pub use digest::{is_digest_like, Digest, DigestError, DigestMethod};
pub use image::{ImageIdentity, ImageName, ImageNameError};
pub use library::{parse_hash_output, LibDigest, LibraryRecord};
pub use resolve::{
    resolve, ArtifactMatch, AttemptOutcome, Candidate, MethodAttempt, MethodPriority,
    QueryArtifact, RecordLookup, Resolution, ResolveError, ResolveOutcome,
};
