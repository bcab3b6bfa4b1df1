//! Read-only index queries (lookup, tags, status)

use anyhow::Result;

use super::output::Output;
use crate::domain::{DigestMethod, ImageIdentity};
use crate::storage::CacheRoot;

/// List the records stored for one digest
pub fn lookup(output: &Output, cache: &CacheRoot, digest: &str) -> Result<()> {
    let digest = digest.trim().to_ascii_lowercase();
    if DigestMethod::accepting(&digest).is_empty() {
        anyhow::bail!("'{}' is not a digest", digest);
    }

    let records = cache.digest_store().load(&digest)?;
    tracing::debug!(%digest, records = records.len(), "loaded records");

    if output.is_json() {
        let items: Vec<_> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "image": r.identity(),
                    "path": r.path,
                })
            })
            .collect();
        output.data(&items);
    } else if records.is_empty() {
        println!("No libraries indexed for {}", digest);
    } else {
        println!("Libraries with digest {} ({}):", digest, records.len());
        for record in &records {
            output.row(&[&record.identity().to_string(), &record.path]);
        }
    }

    Ok(())
}

/// Show the tags recorded for an image
pub fn tags(output: &Output, cache: &CacheRoot, image: &str) -> Result<()> {
    let image: ImageIdentity = image.parse()?;
    let tags = cache.tag_store().get(&image)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "image": image,
            "tags": tags,
        }));
    } else if tags.is_empty() {
        println!("No tags recorded for {}", image);
    } else {
        for tag in &tags {
            println!("{}", tag);
        }
    }

    Ok(())
}

/// Show where the index lives and how large it is
pub fn status(output: &Output, cache: &CacheRoot) -> Result<()> {
    let stats = cache.stats()?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": cache.root().display().to_string(),
            "exists": cache.exists(),
            "digests": stats.digests,
            "tagged_images": stats.tagged_images,
        }));
    } else {
        println!("Index Status");
        println!("{}", "=".repeat(40));
        println!("Path: {}", cache.root().display());
        println!("Digests: {}", stats.digests);
        println!("Tagged images: {}", stats.tagged_images);

        if !cache.exists() {
            println!();
            println!("Nothing indexed yet. Run 'preplib index' to add an image.");
        }
    }

    Ok(())
}
