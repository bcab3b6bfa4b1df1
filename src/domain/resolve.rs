//! Multi-artifact image resolution
//!
//! Given query artifacts annotated with digests, find the image whose
//! recorded libraries match every artifact.
//!
//! ## Algorithm
//!
//! Digest methods are tried in a fixed priority order ([`MethodPriority`]).
//! The first method that yields at least one candidate wins; methods are a
//! fallback chain, not merged evidence. For each method:
//!
//! 1. Skip the method unless every artifact has a digest under it.
//! 2. Seed `image -> {artifact -> path}` from the first artifact's records.
//! 3. For each further artifact, keep only images it also matches.
//! 4. Survivors matched every artifact. None: next method. One: done.
//!    Several: the last one in first-seen store order is chosen.
//!
//! The tie-break is a heuristic. Records are appended as images are
//! indexed, so the last survivor is usually the most recently indexed
//! image. It is not a correctness guarantee, which is why [`Resolution`]
//! keeps the full candidate list.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use super::{Digest, DigestMethod, ImageIdentity, LibraryRecord};

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("No artifacts to resolve")]
    EmptyQuery,

    #[error("Digest method priority list is empty")]
    EmptyPriority,
}

/// Source of library records keyed by digest
pub trait RecordLookup {
    /// Returns every record stored under the digest, in insertion order
    fn lookup(&self, digest: &Digest) -> Result<Vec<LibraryRecord>>;
}

/// A library to locate, with its digests under zero or more methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArtifact {
    /// Caller-chosen key reported back with the matched path
    pub key: String,

    digests: BTreeMap<DigestMethod, Digest>,
}

impl QueryArtifact {
    /// Creates an artifact with no digests yet
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            digests: BTreeMap::new(),
        }
    }

    /// Creates an artifact from a bare digest string.
    ///
    /// The value is used under every method it is syntactically valid for.
    pub fn from_bare_digest(value: &str) -> Self {
        let mut artifact = Self::new(value);
        let normalized = value.trim().to_ascii_lowercase();
        for method in DigestMethod::accepting(&normalized) {
            if let Ok(digest) = Digest::new(method, &normalized) {
                artifact.insert(digest);
            }
        }
        artifact
    }

    /// Adds (or replaces) the digest for its method
    pub fn insert(&mut self, digest: Digest) {
        self.digests.insert(digest.method(), digest);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.insert(digest);
        self
    }

    pub fn digest(&self, method: DigestMethod) -> Option<&Digest> {
        self.digests.get(&method)
    }

    pub fn digests(&self) -> impl Iterator<Item = &Digest> {
        self.digests.values()
    }

    pub fn has_digests(&self) -> bool {
        !self.digests.is_empty()
    }
}

/// Ordered list of digest methods to attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPriority {
    steps: Vec<DigestMethod>,
}

impl MethodPriority {
    /// Creates a priority list; duplicate methods are dropped
    pub fn new(methods: impl IntoIterator<Item = DigestMethod>) -> Result<Self, ResolveError> {
        let mut steps = Vec::new();
        for method in methods {
            if !steps.contains(&method) {
                steps.push(method);
            }
        }
        if steps.is_empty() {
            return Err(ResolveError::EmptyPriority);
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[DigestMethod] {
        &self.steps
    }
}

impl Default for MethodPriority {
    /// Content hash first, then build ID
    fn default() -> Self {
        Self {
            steps: vec![DigestMethod::Md5, DigestMethod::BuildId],
        }
    }
}

/// Path matched for one artifact inside a candidate image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMatch {
    pub key: String,
    pub path: String,
}

/// An image consistent with every query artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub image: ImageIdentity,

    /// Matched paths, in query order
    pub paths: Vec<ArtifactMatch>,
}

impl Candidate {
    /// Returns the matched path for an artifact key
    pub fn path_for(&self, key: &str) -> Option<&str> {
        self.paths
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.path.as_str())
    }
}

/// What happened when one method was attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Some artifacts have no digest under this method
    Uncovered { missing: Vec<String> },

    /// Every artifact was covered but no image matched them all
    NoCandidates,

    /// At least one image matched every artifact
    Matched { candidates: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodAttempt {
    pub method: DigestMethod,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Successful resolution under one method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    method: DigestMethod,
    candidates: Vec<Candidate>,
    attempts: Vec<MethodAttempt>,
}

impl Resolution {
    /// Method that produced the candidates
    pub fn method(&self) -> DigestMethod {
        self.method
    }

    /// Every surviving candidate, in first-seen store order
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Methods attempted, including the successful one
    pub fn attempts(&self) -> &[MethodAttempt] {
        &self.attempts
    }

    /// The chosen candidate: the last survivor ("usually latest")
    pub fn chosen(&self) -> &Candidate {
        // only built from a non-empty candidate list
        &self.candidates[self.candidates.len() - 1]
    }

    /// Returns true if more than one image matched
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Result of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Found(Resolution),
    NotFound { attempts: Vec<MethodAttempt> },
}

impl ResolveOutcome {
    pub fn found(&self) -> Option<&Resolution> {
        match self {
            ResolveOutcome::Found(resolution) => Some(resolution),
            ResolveOutcome::NotFound { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[MethodAttempt] {
        match self {
            ResolveOutcome::Found(resolution) => resolution.attempts(),
            ResolveOutcome::NotFound { attempts } => attempts,
        }
    }
}

/// Resolves the image matching all artifacts, trying methods in priority order
pub fn resolve(
    artifacts: &[QueryArtifact],
    priority: &MethodPriority,
    lookup: &impl RecordLookup,
) -> Result<ResolveOutcome> {
    if artifacts.is_empty() {
        return Err(ResolveError::EmptyQuery.into());
    }

    let mut attempts = Vec::new();

    for &method in priority.steps() {
        let missing: Vec<String> = artifacts
            .iter()
            .filter(|a| a.digest(method).is_none())
            .map(|a| a.key.clone())
            .collect();

        if !missing.is_empty() {
            tracing::debug!(%method, ?missing, "method skipped: not every artifact has a digest");
            attempts.push(MethodAttempt {
                method,
                outcome: AttemptOutcome::Uncovered { missing },
            });
            continue;
        }

        let candidates = intersect(artifacts, method, lookup)?;
        if candidates.is_empty() {
            tracing::debug!(%method, "no candidates");
            attempts.push(MethodAttempt {
                method,
                outcome: AttemptOutcome::NoCandidates,
            });
            continue;
        }

        tracing::debug!(%method, count = candidates.len(), "candidates found");
        attempts.push(MethodAttempt {
            method,
            outcome: AttemptOutcome::Matched {
                candidates: candidates.len(),
            },
        });
        return Ok(ResolveOutcome::Found(Resolution {
            method,
            candidates,
            attempts,
        }));
    }

    Ok(ResolveOutcome::NotFound { attempts })
}

/// Progressive N-way join on image identity, one artifact at a time.
///
/// Every artifact must have a digest under `method`.
fn intersect(
    artifacts: &[QueryArtifact],
    method: DigestMethod,
    lookup: &impl RecordLookup,
) -> Result<Vec<Candidate>> {
    // First-seen order of images, and their matched paths by artifact index
    let mut order: Vec<ImageIdentity> = Vec::new();
    let mut working: HashMap<ImageIdentity, Vec<Option<String>>> = HashMap::new();

    for (index, artifact) in artifacts.iter().enumerate() {
        let Some(digest) = artifact.digest(method) else {
            return Ok(Vec::new());
        };
        let records = lookup.lookup(digest)?;
        tracing::trace!(%digest, records = records.len(), "looked up digest");

        if index == 0 {
            for record in records {
                let image = record.identity();
                let paths = working.entry(image.clone()).or_insert_with(|| {
                    order.push(image);
                    vec![None; artifacts.len()]
                });
                paths[0] = Some(record.path);
            }
        } else {
            for record in records {
                if let Some(paths) = working.get_mut(&record.identity()) {
                    paths[index] = Some(record.path);
                }
            }
            working.retain(|_, paths| paths[index].is_some());
        }

        if working.is_empty() {
            return Ok(Vec::new());
        }
    }

    let mut candidates = Vec::with_capacity(working.len());
    for image in order {
        let Some(paths) = working.remove(&image) else {
            continue;
        };
        let paths = artifacts
            .iter()
            .zip(paths)
            .filter_map(|(artifact, path)| {
                path.map(|path| ArtifactMatch {
                    key: artifact.key.clone(),
                    path,
                })
            })
            .collect();
        candidates.push(Candidate { image, paths });
    }

    Ok(candidates)
}
