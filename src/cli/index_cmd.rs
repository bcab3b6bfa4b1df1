//! Index command

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::output::Output;
use crate::digest::CommandDigester;
use crate::domain::{DigestMethod, ImageName};
use crate::index::{Indexer, MethodResult, TagAliases};
use crate::storage::{CacheRoot, Config};

/// Arguments of `preplib index`
pub struct IndexArgs {
    pub image: String,
    pub rootfs: PathBuf,
    pub methods: Vec<DigestMethod>,
    pub paths_from: Option<PathBuf>,
    pub expand_tags: bool,
    pub paths: Vec<String>,
}

pub fn run(output: &Output, config: &Config, cache: &CacheRoot, args: IndexArgs) -> Result<()> {
    let image: ImageName = args.image.parse()?;

    if !args.rootfs.is_dir() {
        anyhow::bail!("Image filesystem not found: {}", args.rootfs.display());
    }

    let mut paths = args.paths;
    if let Some(list) = &args.paths_from {
        paths.extend(read_path_list(list)?);
    }
    if paths.is_empty() {
        anyhow::bail!("No library paths given; pass paths or --paths-from");
    }

    let methods = if args.methods.is_empty() {
        config.index.methods.clone()
    } else {
        args.methods
    };

    let mut indexer = Indexer::for_cache_root(cache);
    if args.expand_tags {
        indexer = indexer.with_aliases(TagAliases::new(config.aliases.clone()));
    }

    tracing::info!(image = %image, libraries = paths.len(), "indexing");
    let digester = CommandDigester::with_root(&args.rootfs);
    let report = indexer.index_image(&image, &paths, &methods, &digester)?;

    if output.is_json() {
        output.data(&report);
        return Ok(());
    }

    for method in &report.methods {
        match &method.result {
            MethodResult::Indexed {
                digests,
                new_records,
            } => println!(
                "{:<10} {} digests, {} new records",
                method.method, digests, new_records
            ),
            MethodResult::Skipped { reason } => {
                println!("{:<10} skipped: {}", method.method, reason)
            }
        }
    }
    if !report.tags.is_empty() {
        println!("tags       {}", report.tags.join(", "));
    }
    output.success(&format!(
        "Indexed {} ({} new records)",
        report.image,
        report.new_records()
    ));

    Ok(())
}

/// Reads library paths, one per line; blank lines and `#` comments are skipped
fn read_path_list(path: &Path) -> Result<Vec<String>> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read library paths from stdin")?;
        content
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read library paths: {}", path.display()))?
    };

    Ok(parse_path_list(&content))
}

fn parse_path_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .map(str::to_string)
        .collect()
}
