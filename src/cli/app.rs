//! Main CLI application structure

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{config_cmd, index_cmd, lookup, resolve_cmd};
use crate::domain::DigestMethod;
use crate::storage::{CacheRoot, Config};

#[derive(Parser)]
#[command(name = "preplib")]
#[command(author, version, about = "Find the container image that shipped a set of shared libraries")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Cache root holding the library index
    #[arg(long, global = true, env = "PREPLIB_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Configuration file (default: user config dir)
    #[arg(long, global = true, env = "PREPLIB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index the libraries of an extracted image filesystem
    Index {
        /// Image reference pinned by digest (repo[:tag]@sha256:...)
        image: String,

        /// Directory holding the image's extracted filesystem
        #[arg(long)]
        rootfs: PathBuf,

        /// Digest method to index (repeatable; default from config)
        #[arg(long = "method", short = 'm')]
        methods: Vec<DigestMethod>,

        /// Read library paths from a file, one per line ('-' for stdin)
        #[arg(long)]
        paths_from: Option<PathBuf>,

        /// Also record codename and version tags for date-pinned tags
        #[arg(long)]
        expand_tags: bool,

        /// Library paths inside the image
        paths: Vec<String>,
    },

    /// Find the image containing all given libraries
    Resolve {
        /// Digest methods to try, highest priority first (default from config)
        #[arg(long, value_delimiter = ',')]
        order: Vec<DigestMethod>,

        /// Library files or bare digests (md5, build-id, ...)
        #[arg(required = true)]
        artifacts: Vec<String>,
    },

    /// List the library records stored for one digest
    Lookup {
        /// Digest value
        digest: String,
    },

    /// Show the tags an image was indexed under
    Tags {
        /// Image identity (repo@sha256:...)
        image: String,
    },

    /// Show index location and size
    Status,

    /// Inspect configuration
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let output = Output::new(cli.format);

    let config_path = cli.config.clone().or_else(Config::default_path);
    let config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    tracing::debug!(config = ?config_path, "configuration loaded");

    let open_cache = || -> Result<CacheRoot> {
        let cache = CacheRoot::open(config.cache_root(cli.cache_dir.as_deref())?);
        tracing::debug!(cache_root = %cache.root().display(), "using cache root");
        Ok(cache)
    };

    match cli.command {
        Commands::Index {
            image,
            rootfs,
            methods,
            paths_from,
            expand_tags,
            paths,
        } => index_cmd::run(
            &output,
            &config,
            &open_cache()?,
            index_cmd::IndexArgs {
                image,
                rootfs,
                methods,
                paths_from,
                expand_tags,
                paths,
            },
        )?,

        Commands::Resolve { order, artifacts } => {
            resolve_cmd::run(&output, &config, &open_cache()?, &order, &artifacts)?
        }

        Commands::Lookup { digest } => lookup::lookup(&output, &open_cache()?, &digest)?,
        Commands::Tags { image } => lookup::tags(&output, &open_cache()?, &image)?,
        Commands::Status => lookup::status(&output, &open_cache()?)?,

        Commands::Config(cmd) => config_cmd::run(cmd, &output, &config, config_path.as_deref())?,
    }

    tracing::debug!("command completed successfully");
    Ok(())
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the flags
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "preplib=debug"
    } else if quiet {
        "preplib=warn"
    } else {
        "preplib=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}
