//! Config CLI commands

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::storage::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the config file location
    Path,

    /// Print the effective configuration
    Show,

    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(
    cmd: ConfigCommands,
    output: &Output,
    config: &Config,
    config_path: Option<&Path>,
) -> Result<()> {
    match cmd {
        ConfigCommands::Path => {
            let path = config_path
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            if output.is_json() {
                output.data(&serde_json::json!({
                    "path": path.display().to_string(),
                    "exists": path.exists(),
                }));
            } else {
                println!("{}", path.display());
            }
        }
        ConfigCommands::Init { force } => {
            let path = config_path
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
            config.save_to(path)?;
            tracing::debug!(path = %path.display(), "wrote config");
            output.success(&format!("Wrote config to {}", path.display()));
        }
        ConfigCommands::Show => {
            if output.is_json() {
                output.data(config);
            } else {
                print!("{}", toml::to_string_pretty(config)?);
            }
        }
    }

    Ok(())
}
