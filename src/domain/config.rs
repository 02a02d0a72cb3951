use std::{collections::BTreeMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

/// Configuration for importing catalogues.
///
/// This struct holds the location of the requirements repository, how to
/// authenticate against it, transport timeouts, and optional overrides of the
/// locations the standards are downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Base URL of the requirements repository API.
    ///
    /// For example, `https://reqdb.example.com`. The entity endpoints live
    /// below `{base_url}/api/`.
    base_url: String,

    /// Name of the environment variable holding the API bearer token.
    ///
    /// The token itself is never stored in the configuration file.
    token_env: String,

    /// Overall timeout of a single request, in seconds.
    timeout_secs: u64,

    /// Timeout for establishing a connection, in seconds.
    connect_timeout_secs: u64,

    /// Download location overrides, keyed by source name (e.g. `asvs`).
    ///
    /// Values are URLs or local file paths.
    sources: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            sources: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the base URL of the repository API, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Overrides the base URL of the repository API.
    pub fn set_base_url(&mut self, base_url: String) {
        self.base_url = base_url;
    }

    /// Returns the name of the environment variable holding the API token.
    #[must_use]
    pub fn token_env(&self) -> &str {
        &self.token_env
    }

    /// Reads the API token from the configured environment variable.
    ///
    /// Returns `None` if the variable is unset or empty.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    /// Overall timeout of a single request.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Timeout for establishing a connection.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the configured location override for a source, if any.
    #[must_use]
    pub fn source_override(&self, source: &str) -> Option<&str> {
        self.sources.get(source).map(String::as_str)
    }

    /// Sets the location override for a source.
    ///
    /// Returns the previous override, if any.
    pub fn set_source_override(&mut self, source: &str, location: String) -> Option<String> {
        self.sources.insert(source.to_string(), location)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_token_env() -> String {
    "REQDB_TOKEN".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_connect_timeout_secs() -> u64 {
    15
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_base_url")]
        base_url: String,

        #[serde(default = "default_token_env")]
        token_env: String,

        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,

        #[serde(default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,

        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        sources: BTreeMap<String, String>,
    },
}

impl From<Versions> for super::Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                base_url,
                token_env,
                timeout_secs,
                connect_timeout_secs,
                sources,
            } => Self {
                base_url,
                token_env,
                timeout_secs,
                connect_timeout_secs,
                sources,
            },
        }
    }
}

impl From<super::Config> for Versions {
    fn from(config: super::Config) -> Self {
        Self::V1 {
            base_url: config.base_url,
            token_env: config.token_env,
            timeout_secs: config.timeout_secs,
            connect_timeout_secs: config.connect_timeout_secs,
            sources: config.sources,
        }
    }
}
