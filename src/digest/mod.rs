//! Digest computation
//!
//! Computing digests is delegated to external commands (`md5sum`,
//! `readelf`, ...). The rest of the crate only sees the [`DigestSource`]
//! trait: "give me digests for these paths".

mod command;

pub use command::{parse_build_id, CommandDigester};

use anyhow::Result;

use crate::domain::{Digest, DigestMethod, LibDigest, QueryArtifact};

/// Computes digests for library paths under one method
pub trait DigestSource {
    /// Returns `(path, digest)` pairs for the given paths.
    ///
    /// Paths the tool could not digest are simply absent from the result.
    fn digests(&self, method: DigestMethod, paths: &[String]) -> Result<Vec<LibDigest>>;
}

/// Builds a query artifact for a local file, computing one digest per method.
///
/// A method whose computation fails or produces no valid digest is left
/// out, so the resolver will treat it as uncovered.
pub fn artifact_for_file(
    path: &str,
    methods: &[DigestMethod],
    source: &impl DigestSource,
) -> QueryArtifact {
    let mut artifact = QueryArtifact::new(path);
    let paths = [path.to_string()];

    for &method in methods {
        match source.digests(method, &paths) {
            Ok(digests) => {
                let digest = digests
                    .into_iter()
                    .find(|d| d.path == path)
                    .and_then(|d| Digest::new(method, d.digest).ok());
                match digest {
                    Some(digest) => artifact.insert(digest),
                    None => tracing::debug!(%method, path, "no digest produced"),
                }
            }
            Err(e) => tracing::debug!(%method, path, error = %e, "digest computation failed"),
        }
    }

    artifact
}
