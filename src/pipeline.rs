//! # Pipeline Stages
//!
//! The two stage handlers and the shared client handles they run on.
//!
//! - [`ScrapeStage`]: trigger -> fetch -> raw HTML write
//! - [`ProcessStage`]: storage notification -> raw HTML read -> extraction
//!   -> JSON write -> optional next-page publish
//!
//! Every invocation is independent. The only thing shared between
//! invocations is the [`Pipeline`] holding the HTTP client, object store and
//! publisher, which is built once at startup and passed to the stages.

mod process;
mod scrape;

pub use process::{ProcessOutcome, ProcessStage, RuleSource};
pub use scrape::{ScrapeOutcome, ScrapeStage};

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::extraction::ExtractionEngine;
use crate::fetcher::Fetcher;
use crate::queue::{PubSubPublisher, Publisher};
use crate::storage::{build_store, ObjectStore, StorageBackend};

/// Plain-text outcome of a request-triggered invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResponse {
    pub status: u16,
    pub message: String,
}

impl StageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: 200,
            message: message.into(),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Both stages wired to the same client handles
pub struct Pipeline {
    pub config: Arc<PipelineConfig>,
    pub scrape: ScrapeStage,
    pub process: ProcessStage,
}

impl Pipeline {
    /// Build the shared clients and both stages from configuration
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let store = build_store(&config, client.clone());
        let publisher = build_publisher(&config, client.clone());
        let fetcher = Fetcher::new(client).with_timeout(config.fetch_timeout);

        Ok(Self::with_parts(config, fetcher, store, publisher))
    }

    /// Assemble a pipeline from explicit parts
    pub fn with_parts(
        config: PipelineConfig,
        fetcher: Fetcher,
        store: Arc<dyn ObjectStore>,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Self {
        let config = Arc::new(config);
        let engine = ExtractionEngine::from_config(&config);
        let rules = RuleSource::File(config.rules_path.clone());

        Self {
            scrape: ScrapeStage::new(fetcher, store.clone(), config.clone()),
            process: ProcessStage::new(store, publisher, rules, engine, config.clone()),
            config,
        }
    }

    /// Drop point for the shared client handles. The HTTP connection pool
    /// closes once the last stage holding the client is gone.
    pub fn shutdown(self) {
        info!("Shutting down pipeline");
        drop(self);
    }
}

/// Build the publisher for the configured crawl topic, if there is one.
///
/// Publishing needs Pub/Sub: either the GCS backend or an explicit
/// `PUBSUB_ENDPOINT`. Without one, next pages are not published.
pub fn build_publisher(
    config: &PipelineConfig,
    client: reqwest::Client,
) -> Option<Arc<dyn Publisher>> {
    let topic = config.crawl_topic.as_ref()?;

    if config.storage_backend != StorageBackend::Gcs && config.pubsub_endpoint.is_none() {
        warn!(
            topic = %topic,
            "No Pub/Sub endpoint for the local backend, next pages will not be published"
        );
        return None;
    }

    let mut publisher = PubSubPublisher::new(client);
    if let Some(endpoint) = &config.pubsub_endpoint {
        publisher = publisher.with_endpoint(endpoint.clone());
    }
    if let Some(token) = &config.access_token {
        publisher = publisher.with_token(token.clone());
    }
    Some(Arc::new(publisher))
}
