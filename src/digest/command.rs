//! Digests computed by host tools
//!
//! - `md5sum`, `sha1sum`, `sha256sum`, `sha512sum` for content hashes
//! - `readelf -n` for the GNU build ID note
//!
//! With a root directory, paths are in-image paths resolved against an
//! extracted image filesystem and reported back unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use super::DigestSource;
use crate::domain::{parse_hash_output, DigestMethod, LibDigest};

/// Runs host digest tools over local files
#[derive(Debug, Clone, Default)]
pub struct CommandDigester {
    root: Option<PathBuf>,
}

impl CommandDigester {
    /// Digests host paths as given
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Digests in-image paths below an extracted image filesystem
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn host_path(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }

    /// Maps host path strings back to the caller's paths
    fn host_paths(&self, paths: &[String]) -> (Vec<PathBuf>, HashMap<String, String>) {
        let mut hosts = Vec::with_capacity(paths.len());
        let mut back = HashMap::with_capacity(paths.len());
        for path in paths {
            let host = self.host_path(path);
            back.insert(host.to_string_lossy().into_owned(), path.clone());
            hosts.push(host);
        }
        (hosts, back)
    }

    fn checksum(&self, tool: &str, paths: &[String]) -> Result<Vec<LibDigest>> {
        let (hosts, back) = self.host_paths(paths);

        let output = Command::new(tool)
            .arg("--")
            .args(&hosts)
            .output()
            .with_context(|| format!("Failed to run {}", tool))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let digests: Vec<LibDigest> = parse_hash_output(&stdout)
            .into_iter()
            .map(unescape_sum_line)
            .filter_map(|d| {
                let path = back.get(&d.path)?.clone();
                Some(LibDigest {
                    path,
                    digest: d.digest,
                })
            })
            .collect();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if digests.is_empty() {
                anyhow::bail!("{} failed ({}): {}", tool, output.status, stderr.trim());
            }
            tracing::warn!(tool, stderr = %stderr.trim(), "some files could not be digested");
        }

        Ok(digests)
    }

    fn build_ids(&self, paths: &[String]) -> Result<Vec<LibDigest>> {
        let mut digests = Vec::new();
        let mut failures = Vec::new();

        for path in paths {
            let host = self.host_path(path);
            let output = Command::new("readelf")
                .arg("-n")
                .arg(&host)
                .output()
                .context("Failed to run readelf")?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::debug!(path = %path, stderr = %stderr.trim(), "readelf failed");
                failures.push(format!("{}: {}", path, stderr.trim()));
            }

            match parse_build_id(&String::from_utf8_lossy(&output.stdout)) {
                Some(digest) => digests.push(LibDigest {
                    path: path.clone(),
                    digest,
                }),
                None => tracing::debug!(path = %path, "no build ID note"),
            }
        }

        if digests.is_empty() && !failures.is_empty() {
            anyhow::bail!(
                "readelf failed for {} of {} files: {}",
                failures.len(),
                paths.len(),
                failures.join("; ")
            );
        }
        if !failures.is_empty() {
            tracing::warn!(failed = failures.len(), "some files could not be read by readelf");
        }

        Ok(digests)
    }
}

impl DigestSource for CommandDigester {
    fn digests(&self, method: DigestMethod, paths: &[String]) -> Result<Vec<LibDigest>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        match method {
            DigestMethod::BuildId => self.build_ids(paths),
            DigestMethod::Md5 => self.checksum("md5sum", paths),
            DigestMethod::Sha1 => self.checksum("sha1sum", paths),
            DigestMethod::Sha256 => self.checksum("sha256sum", paths),
            DigestMethod::Sha512 => self.checksum("sha512sum", paths),
        }
    }
}

/// Undoes coreutils' escaping of file names containing `\` or newline.
///
/// Such lines start with a backslash before the digest.
fn unescape_sum_line(entry: LibDigest) -> LibDigest {
    let Some(digest) = entry.digest.strip_prefix('\\') else {
        return entry;
    };

    let mut path = String::with_capacity(entry.path.len());
    let mut chars = entry.path.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            path.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => path.push('\n'),
            Some('r') => path.push('\r'),
            Some(other) => path.push(other),
            None => path.push('\\'),
        }
    }

    LibDigest {
        path,
        digest: digest.to_string(),
    }
}

/// Extracts the GNU build ID from `readelf -n` output
pub fn parse_build_id(output: &str) -> Option<String> {
    let mut after_note = false;
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(id) = trimmed.strip_prefix("Build ID:") {
            return valid_build_id(id);
        }
        if after_note {
            if let Some((_, id)) = trimmed.rsplit_once(": ") {
                return valid_build_id(id);
            }
        }
        after_note = trimmed.contains("NT_GNU_BUILD_ID");
    }
    None
}

fn valid_build_id(id: &str) -> Option<String> {
    let id = id.trim().to_ascii_lowercase();
    DigestMethod::BuildId.accepts(&id).then_some(id)
}
