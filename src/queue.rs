//! # Crawl Queue
//!
//! When a processed page has a next page, the process stage publishes a
//! [`CrawlRequest`] so the scrape stage picks the URL up. Publishing is
//! fire-and-forget: nothing waits for the message to be consumed.

mod memory;
mod pubsub;

pub use memory::MemoryPublisher;
pub use pubsub::PubSubPublisher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for publish operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("publish API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid topic: {0}")]
    InvalidTopic(String),
}

/// Message body asking the scrape stage to fetch a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// UTF-8 JSON body of the message
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Sends crawl requests to a named destination
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one request; returns the message id when the backend reports one
    async fn publish(&self, topic: &str, request: &CrawlRequest) -> Result<Option<String>, PublishError>;
}
