//! Retrieval of source documents.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use reqwest::blocking::Client;
use tracing::instrument;

use crate::domain::Config;

/// Where a source document is retrieved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A document downloaded over HTTP(S).
    Url(String),
    /// A document on the local filesystem.
    File(PathBuf),
}

impl Location {
    /// Interprets a string as a URL if it has an HTTP(S) scheme, and as a file
    /// path otherwise.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::File(PathBuf::from(location))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors raised while retrieving a source document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or its body not received.
    #[error("failed to download {url}")]
    Request {
        /// The requested URL.
        url: String,
        /// The transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("download of {url} failed with status {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A local file could not be read.
    #[error("failed to read {}", path.display())]
    Read {
        /// The file that could not be read.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Retrieves the raw bytes of a source document.
pub trait Fetch {
    /// Retrieves the document at `location`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be downloaded or read.
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, FetchError>;
}

/// Fetches documents over HTTP(S) or from the local filesystem.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher using the transport timeouts from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .user_agent(concat!("req-import/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(skip(self), fields(location = %location))]
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, FetchError> {
        match location {
            Location::File(path) => read_file(path),
            Location::Url(url) => {
                tracing::info!("Downloading {url}");
                let request_error = |source| FetchError::Request {
                    url: url.clone(),
                    source,
                };

                let response = self.client.get(url).send().map_err(request_error)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }

                let bytes = response.bytes().map_err(request_error)?;
                tracing::debug!("Downloaded {} bytes", bytes.len());
                Ok(bytes.to_vec())
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    tracing::info!("Reading {}", path.display());
    std::fs::read(path).map_err(|source| FetchError::Read {
        path: path.to_path_buf(),
        source,
    })
}
