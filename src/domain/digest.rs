//! Digest methods and scoped digest values
//!
//! A library file is fingerprinted under several independent methods:
//! - `build-id`: the `NT_GNU_BUILD_ID` note embedded by the linker
//! - `md5`, `sha1`, `sha256`, `sha512`: content hashes
//!
//! Values from different methods live in disjoint key spaces. A [`Digest`]
//! always carries its method so the resolver never compares across methods.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DigestError {
    #[error("Unknown digest method '{0}' (expected one of: build-id, md5, sha1, sha256, sha512)")]
    UnknownMethod(String),

    #[error("'{value}' is not a valid {method} digest")]
    InvalidValue { method: DigestMethod, value: String },
}

/// Algorithm used to fingerprint a library file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestMethod {
    BuildId,
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestMethod {
    /// All methods, in declaration order
    pub const ALL: [DigestMethod; 5] = [
        DigestMethod::BuildId,
        DigestMethod::Md5,
        DigestMethod::Sha1,
        DigestMethod::Sha256,
        DigestMethod::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestMethod::BuildId => "build-id",
            DigestMethod::Md5 => "md5",
            DigestMethod::Sha1 => "sha1",
            DigestMethod::Sha256 => "sha256",
            DigestMethod::Sha512 => "sha512",
        }
    }

    /// Returns true if `value` is syntactically a digest of this method.
    ///
    /// Content hashes have a fixed hex length. Build IDs vary with the
    /// linker's `--build-id` style (md5, sha1, uuid, custom hex), so any
    /// even-length hex string from 8 to 64 bytes is accepted.
    pub fn accepts(&self, value: &str) -> bool {
        if !is_lower_hex(value) {
            return false;
        }
        match self {
            DigestMethod::BuildId => value.len() % 2 == 0 && (16..=128).contains(&value.len()),
            DigestMethod::Md5 => value.len() == 32,
            DigestMethod::Sha1 => value.len() == 40,
            DigestMethod::Sha256 => value.len() == 64,
            DigestMethod::Sha512 => value.len() == 128,
        }
    }

    /// Methods under which a bare digest string is valid.
    ///
    /// The same hex string can be both an md5 and a build-id when lengths
    /// coincide, so this may return several methods.
    pub fn accepting(value: &str) -> Vec<DigestMethod> {
        Self::ALL.into_iter().filter(|m| m.accepts(value)).collect()
    }
}

impl fmt::Display for DigestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestMethod {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build-id" | "build_id" | "buildid" => Ok(DigestMethod::BuildId),
            "md5" => Ok(DigestMethod::Md5),
            "sha1" => Ok(DigestMethod::Sha1),
            "sha256" => Ok(DigestMethod::Sha256),
            "sha512" => Ok(DigestMethod::Sha512),
            other => Err(DigestError::UnknownMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for DigestMethod {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DigestMethod> for String {
    fn from(method: DigestMethod) -> Self {
        method.as_str().to_string()
    }
}

/// A digest value scoped to the method that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    method: DigestMethod,
    value: String,
}

impl Digest {
    /// Creates a digest, validating the value against the method
    pub fn new(method: DigestMethod, value: impl Into<String>) -> Result<Self, DigestError> {
        let value = value.into().trim().to_ascii_lowercase();
        if !method.accepts(&value) {
            return Err(DigestError::InvalidValue { method, value });
        }
        Ok(Self { method, value })
    }

    pub fn method(&self) -> DigestMethod {
        self.method
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.value)
    }
}

/// Returns true if the string looks like a hex digest a user could type
/// on the command line (md5, sha1, sha256 or sha512 length).
pub fn is_digest_like(s: &str) -> bool {
    is_lower_hex(s) && matches!(s.len(), 32 | 40 | 64 | 128)
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
