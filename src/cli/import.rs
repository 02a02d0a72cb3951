use std::path::PathBuf;

use anyhow::Context;
use reqimport::{
    domain::{Config, EntityKind},
    import::{self, Committed},
    repository::{HttpRepository, MemoryRepository},
    session::RollbackReport,
    source::{HttpFetcher, Location, Standard},
};
use tracing::instrument;

use super::terminal::{Colorize, underline};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The standard to import (see the `sources` command)
    #[arg(value_name = "STANDARD")]
    standard: Standard,

    /// Read the standard from a local file instead of downloading it
    #[arg(long, value_name = "PATH", conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Download the standard from this URL
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Base URL of the requirements repository, overriding the config file
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Import into an in-memory repository and only print what would be created
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument(skip(config))]
    pub fn run(self, mut config: Config) -> anyhow::Result<()> {
        if let Some(base_url) = self.base_url {
            config.set_base_url(base_url);
        }

        let explicit = self
            .file
            .map(Location::File)
            .or_else(|| self.url.map(Location::Url));
        let location = import::locate(self.standard, &config, explicit)?;

        let fetcher = HttpFetcher::new(&config).context("Failed to initialize HTTP client")?;
        let drafts = import::prepare(self.standard, &fetcher, &location)?;

        if self.dry_run {
            let repository = MemoryRepository::new();
            let committed = import::commit(&repository, &drafts)?;
            print_summary(self.standard, &committed);
            println!();
            println!(
                "{}",
                format!("Dry run: nothing was sent to {}", config.base_url()).warning()
            );
            return Ok(());
        }

        let repository =
            HttpRepository::new(&config).context("Failed to initialize repository client")?;
        match import::commit(&repository, &drafts) {
            Ok(committed) => {
                print_summary(self.standard, &committed);
                Ok(())
            }
            Err(error) => {
                print_rollback(&error.rollback);
                Err(error.into())
            }
        }
    }
}

fn print_summary(standard: Standard, committed: &Committed) {
    let heading = format!("Imported {}", standard.title());
    println!("{}", heading.success());
    println!("{}", underline(&heading));

    for (title, id) in &committed.catalogues {
        println!("  {title} {}", format!("(ID {id})").info());
    }
    println!();

    for kind in EntityKind::ALL {
        let count = committed.ledger.count(kind);
        if count > 0 {
            println!("  {:<14} {count:>6}", kind.to_string());
        }
    }
    println!("  {}", format!("run {}", committed.run_id).dim());
}

fn print_rollback(report: &RollbackReport) {
    eprintln!(
        "{}",
        format!("Import failed; rolled back {} entities", report.deleted).warning()
    );
    if report.is_clean() {
        return;
    }
    eprintln!(
        "{}",
        format!(
            "{} entities could not be deleted and remain in the repository:",
            report.failures.len()
        )
        .warning()
    );
    for failure in &report.failures {
        eprintln!("  {} {}", failure.kind, failure.id.to_string().info());
    }
}
