//! Library observations
//!
//! A [`LibraryRecord`] states that an image exposes a file at a path whose
//! digest (under some method) is the key it is stored under.

use serde::{Deserialize, Serialize};

use super::ImageIdentity;

/// One observation of a library file inside an image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryRecord {
    /// Image repository name
    pub repository: String,

    /// Image content digest
    pub image_digest: String,

    /// Path of the file inside the image
    pub path: String,
}

impl LibraryRecord {
    pub fn new(
        repository: impl Into<String>,
        image_digest: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            image_digest: image_digest.into(),
            path: path.into(),
        }
    }

    /// Creates a record for a path inside the given image
    pub fn for_image(image: &ImageIdentity, path: impl Into<String>) -> Self {
        Self::new(image.repository(), image.digest(), path)
    }

    /// Returns the identity of the image this record belongs to
    pub fn identity(&self) -> ImageIdentity {
        ImageIdentity::new(&self.repository, &self.image_digest)
    }
}

/// A digest computed for a path, as reported by a digest command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibDigest {
    pub path: String,
    pub digest: String,
}

/// Parses `<digest> <path>` lines as printed by `md5sum` and friends.
///
/// The `*` binary-mode marker before the path is dropped and the rest of
/// the line is kept verbatim, so paths with spaces survive. Lines without
/// both fields are skipped.
pub fn parse_hash_output(output: &str) -> Vec<LibDigest> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let (digest, rest) = line.trim_start().split_once(char::is_whitespace)?;
            let path = rest.strip_prefix([' ', '*']).unwrap_or(rest);
            if digest.is_empty() || path.trim().is_empty() {
                return None;
            }
            Some(LibDigest {
                path: path.to_string(),
                digest: digest.to_ascii_lowercase(),
            })
        })
        .collect()
}
