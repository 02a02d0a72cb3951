use clap::Parser;
use reqimport::{domain::Config, source::Standard};
use tracing::instrument;

use super::terminal::{Colorize, underline};

#[derive(Debug, Parser, Default)]
pub struct Command {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Where a standard is retrieved from under the given configuration.
fn location(standard: Standard, config: &Config) -> Option<String> {
    config
        .source_override(standard.name())
        .or_else(|| standard.default_url())
        .map(str::to_string)
}

impl Command {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        match self.output {
            OutputFormat::Json => Self::output_json(config)?,
            OutputFormat::Table => Self::output_table(config),
        }
        Ok(())
    }

    fn output_json(config: &Config) -> anyhow::Result<()> {
        use serde_json::json;

        let sources: Vec<_> = Standard::ALL
            .into_iter()
            .map(|standard| {
                json!({
                    "name": standard.name(),
                    "title": standard.title(),
                    "format": standard.format(),
                    "location": location(standard, config),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&sources)?);
        Ok(())
    }

    fn output_table(config: &Config) {
        let heading = "Available standards";
        println!("{heading}");
        println!("{}", underline(heading));

        for standard in Standard::ALL {
            println!(
                "{} {} {}",
                format!("{:<14}", standard.name()).success(),
                standard.title(),
                format!("({})", standard.format()).dim()
            );
            match location(standard, config) {
                Some(location) => println!("{:<14} {}", "", location.info()),
                None => println!(
                    "{:<14} {}",
                    "",
                    "local file only, pass --file".warning()
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_default_location() {
        let mut config = Config::default();
        assert_eq!(
            location(Standard::Samm, &config).as_deref(),
            Standard::Samm.default_url()
        );

        config.set_source_override("samm", "/srv/standards/samm.xlsx".to_string());
        assert_eq!(
            location(Standard::Samm, &config).as_deref(),
            Some("/srv/standards/samm.xlsx")
        );
    }

    #[test]
    fn cis_controls_have_no_default_location() {
        assert_eq!(location(Standard::CisControls, &Config::default()), None);
    }
}
