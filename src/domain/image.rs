//! Image names and identities
//!
//! Formats:
//! - Image reference: `repository[:tag][@content-digest]` (e.g., `ubuntu:jammy-20250530@sha256:...`)
//! - Image identity: `repository@content-digest` (e.g., `ubuntu@sha256:...`)
//!
//! The identity is content-addressed and never changes. A tag is a mutable
//! alias; it is recorded in the tag store at index time, never in the
//! digest store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ImageNameError {
    #[error("Empty image reference")]
    Empty,

    #[error("Invalid image identity: expected '{{repository}}@{{digest}}', got '{0}'")]
    InvalidIdentity(String),

    #[error("Image reference '{0}' has no content digest; use 'repository[:tag]@sha256:...'")]
    MissingDigest(String),
}

/// Canonical, content-addressed name of one image manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageIdentity {
    repository: String,
    digest: String,
}

impl ImageIdentity {
    pub fn new(repository: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            digest: digest.into(),
        }
    }

    /// Repository name (e.g., `ubuntu`, `amd64/ubuntu`)
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Content digest of the manifest (e.g., `sha256:...`)
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.digest)
    }
}

impl FromStr for ImageIdentity {
    type Err = ImageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.rsplit_once('@') {
            Some((repository, digest))
                if !repository.is_empty()
                    && !digest.is_empty()
                    && !repository.contains(char::is_whitespace)
                    && !digest.contains(char::is_whitespace) =>
            {
                Ok(Self::new(repository, digest))
            }
            _ => Err(ImageNameError::InvalidIdentity(s.to_string())),
        }
    }
}

impl TryFrom<String> for ImageIdentity {
    type Error = ImageNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageIdentity> for String {
    fn from(id: ImageIdentity) -> Self {
        id.to_string()
    }
}

/// A parsed image reference as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageName {
    /// Returns the identity if the reference pins a content digest
    pub fn identity(&self) -> Result<ImageIdentity, ImageNameError> {
        match &self.digest {
            Some(digest) => Ok(ImageIdentity::new(&self.repository, digest)),
            None => Err(ImageNameError::MissingDigest(self.to_string())),
        }
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl FromStr for ImageName {
    type Err = ImageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ImageNameError::Empty);
        }

        // Digest only counts when '@' is in the last path component
        let last_part = s.rsplit('/').next().unwrap_or(s);
        let (name_tag, digest) = if last_part.contains('@') {
            let (name_tag, digest) = s.rsplit_once('@').unwrap_or((s, ""));
            (name_tag, Some(digest.to_string()))
        } else {
            (s, None)
        };

        // Tag only counts when ':' is in the last path component, so that
        // `registry:5000/repo` keeps its port
        let slash = name_tag.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (repository, tag) = match name_tag[slash..].find(':') {
            Some(colon) => {
                let split = slash + colon;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        let has_space = |part: &str| part.contains(char::is_whitespace);
        if repository.is_empty()
            || digest.as_deref() == Some("")
            || has_space(repository)
            || repository.contains('@')
            || tag.as_deref().is_some_and(has_space)
            || digest.as_deref().is_some_and(has_space)
        {
            return Err(ImageNameError::InvalidIdentity(s.to_string()));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.filter(|t| !t.is_empty()),
            digest,
        })
    }
}
