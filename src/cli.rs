use std::path::{Path, PathBuf};

mod import;
mod init;
mod sources;
mod terminal;

use anyhow::Context;
use clap::ArgAction;
use reqimport::domain::Config;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the configuration file
    #[arg(short, long, default_value = "req-import.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(&self.config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// Loads the configuration file, falling back to defaults if it does not exist.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    Config::load(path)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to load {}", path.display()))
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Import a standard into the requirements repository
    ///
    /// Every catalogue of the standard is created in one run. If any entity
    /// cannot be created, everything created by the run is deleted again.
    Import(import::Command),

    /// List the standards that can be imported
    Sources(sources::Command),

    /// Write a default configuration file
    Init(init::Command),
}

impl Command {
    fn run(self, config_path: &Path) -> anyhow::Result<()> {
        match self {
            Self::Import(command) => command.run(load_config(config_path)?)?,
            Self::Sources(command) => command.run(&load_config(config_path)?)?,
            Self::Init(command) => command.run(config_path)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_config_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("req-import.toml");
        fs::write(&path, "base_url = [").unwrap();

        let error = load_config(&path).unwrap_err();
        assert!(error.to_string().starts_with("Failed to load"));
    }
}
