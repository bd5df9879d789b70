//! Error types for the pagechain crate

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetcher::FetchError;
use crate::queue::PublishError;
use crate::storage::StorageError;
use crate::trigger::TriggerError;

/// Result type for pagechain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a single stage invocation
///
/// Each variant is one failure category of the pipeline. Every one of them
/// ends the invocation; none is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// A required destination or setting is missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The inbound trigger payload could not be understood
    #[error("Invalid trigger: {0}")]
    Trigger(#[from] TriggerError),

    /// The outbound page fetch failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Reading or writing the object store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Publishing the follow-up crawl request failed
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP-style status reported for this failure by the scrape trigger
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Trigger(_) => 400,
            _ => 500,
        }
    }

    /// Short label for the failure category, used as the `error_type` log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration",
            Error::Trigger(_) => "trigger",
            Error::Fetch(_) => "fetch",
            Error::Storage(StorageError::Decode { .. }) => "decode",
            Error::Storage(_) => "storage",
            Error::Publish(_) => "publish",
            Error::Json(_) => "json",
            Error::Other(_) => "unexpected",
        }
    }
}
