//! Resolve command
//!
//! Each artifact is either a library file (digests computed locally) or a
//! bare digest. The image that contains all of them is printed with its
//! known tags and the matching path of every artifact.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use super::output::{format_tags, Output};
use crate::digest::{artifact_for_file, CommandDigester};
use crate::domain::{
    is_digest_like, resolve, AttemptOutcome, Candidate, DigestMethod, MethodPriority, QueryArtifact,
    ResolveOutcome,
};
use crate::storage::{CacheRoot, Config};

pub fn run(
    output: &Output,
    config: &Config,
    cache: &CacheRoot,
    order: &[DigestMethod],
    inputs: &[String],
) -> Result<()> {
    let priority = if order.is_empty() {
        config.priority()?
    } else {
        MethodPriority::new(order.iter().copied())?
    };

    let digester = CommandDigester::new();
    let artifacts = inputs
        .iter()
        .map(|input| query_artifact(input, &priority, &digester))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!("searching images from indexed libraries...");
    let outcome = resolve(&artifacts, &priority, &cache.digest_store())?;

    for attempt in outcome.attempts() {
        match &attempt.outcome {
            AttemptOutcome::Uncovered { missing } => tracing::debug!(
                method = %attempt.method,
                ?missing,
                "not every artifact has a digest"
            ),
            AttemptOutcome::NoCandidates => {
                tracing::warn!("no candidates found by {}", attempt.method)
            }
            AttemptOutcome::Matched { .. } => {}
        }
    }

    let resolution = match outcome {
        ResolveOutcome::Found(resolution) => resolution,
        ResolveOutcome::NotFound { .. } => anyhow::bail!("no candidates found"),
    };

    let tag_store = cache.tag_store();
    let chosen = resolution.chosen();

    if resolution.is_ambiguous() {
        tracing::warn!("multiple images contain the same libraries:");
        for candidate in resolution.candidates() {
            tracing::warn!("{}", describe(candidate, &tag_store.get(&candidate.image)?));
            for m in &candidate.paths {
                tracing::warn!("- {} => {}", m.key, m.path);
            }
        }
        tracing::warn!("using the last (usually latest) one");
    }

    let tags = tag_store.get(&chosen.image)?;

    if output.is_json() {
        let paths: BTreeMap<_, _> = chosen
            .paths
            .iter()
            .map(|m| (m.key.as_str(), m.path.as_str()))
            .collect();
        output.data(&serde_json::json!({
            "image": chosen.image,
            "tags": tags,
            "method": resolution.method(),
            "paths": paths,
            "ambiguous": resolution.is_ambiguous(),
            "candidates": resolution.candidates(),
        }));
    } else {
        println!("{}", describe(chosen, &tags));
        for m in &chosen.paths {
            println!("- {} => {}", m.key, m.path);
        }
    }

    Ok(())
}

/// Turns a command-line argument into a query artifact
fn query_artifact(
    input: &str,
    priority: &MethodPriority,
    digester: &CommandDigester,
) -> Result<QueryArtifact> {
    if Path::new(input).is_file() {
        let artifact = artifact_for_file(input, priority.steps(), digester);
        let digests: Vec<String> = artifact.digests().map(|d| d.to_string()).collect();
        tracing::debug!(file = input, ?digests, "computed digests");
        return Ok(artifact);
    }

    let artifact = QueryArtifact::from_bare_digest(input);
    if !artifact.has_digests() {
        anyhow::bail!("'{}' is neither a library file nor a digest", input);
    }
    if !is_digest_like(&input.trim().to_ascii_lowercase()) {
        tracing::debug!(digest = input, "not a content hash length; using it as a build ID only");
    }
    Ok(artifact)
}

fn describe(candidate: &Candidate, tags: &[String]) -> String {
    let image = &candidate.image;
    if tags.is_empty() {
        format!(
            "found in image \"{}\" (image digest: {})",
            image.repository(),
            image.digest()
        )
    } else {
        format!(
            "found in image \"{}\" once tagged as {} (image digest: {})",
            image.repository(),
            format_tags(tags),
            image.digest()
        )
    }
}
