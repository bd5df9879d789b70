//! Outbound page fetching
//!
//! One GET per invocation with a browser user agent and a hard timeout.
//! Failures are reported, never retried.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::extraction::RawDocument;

/// A realistic desktop user agent; some sites block obvious bots
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Error type for page fetches
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme in {0}")]
    UnsupportedScheme(String),

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("error fetching {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = source.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Parse a target URL, accepting only http and https
pub fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|source| FetchError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(FetchError::UnsupportedScheme(raw.to_string())),
    }
}

/// Fetches pages with a shared HTTP client
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl Fetcher {
    /// Create a fetcher around a shared client with the default timeout
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// GET a page and return its body as text
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
        debug!("Sending GET request");
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        debug!(bytes = html.len(), "Fetched page");
        Ok(RawDocument::from_url(url.clone(), html))
    }
}
