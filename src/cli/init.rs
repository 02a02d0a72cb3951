use std::path::Path;

use reqimport::domain::Config;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, path: &Path) -> anyhow::Result<()> {
        if path.exists() && !self.force {
            anyhow::bail!(
                "Configuration file {} already exists (use --force to overwrite)",
                path.display()
            );
        }

        let config = Config::default();
        config
            .save(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;

        println!("Created {}", path.display());
        println!();
        println!("Next steps:");
        println!("  Set base_url to your requirements repository");
        println!(
            "  export {}=<token>  # API token",
            config.token_env()
        );
        println!("  req-import import asvs --dry-run");
        Ok(())
    }
}
