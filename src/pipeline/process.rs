//! Process stage: turn a stored raw page into extraction JSON

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::extraction::{DomainRules, Extraction, ExtractionEngine, Policy, RawDocument};
use crate::keys::processed_key;
use crate::queue::{CrawlRequest, Publisher};
use crate::storage::{ObjectRef, ObjectStore, JSON_CONTENT_TYPE};
use crate::trigger::parse_storage_event;

/// Where the per-domain rules come from
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// Re-read from disk on every invocation
    File(PathBuf),
    /// A fixed rule set
    Fixed(Arc<DomainRules>),
}

impl RuleSource {
    async fn rules(&self) -> Result<Arc<DomainRules>> {
        match self {
            RuleSource::File(path) => {
                // Loading reads the file synchronously
                let path = path.clone();
                let rules = task::spawn_blocking(move || DomainRules::load(path))
                    .await
                    .map_err(|e| Error::Other(format!("Failed to load selector rules: {}", e)))?;
                Ok(Arc::new(rules))
            }
            RuleSource::Fixed(rules) => Ok(rules.clone()),
        }
    }
}

/// A file that was processed and written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub source: ObjectRef,
    pub destination: ObjectRef,
    pub policy: Policy,
    pub extraction: Extraction,
    /// Message id of the next-page request, when one was published
    pub published: Option<String>,
}

/// Reads raw pages, extracts from them and writes the results
#[derive(Clone)]
pub struct ProcessStage {
    store: Arc<dyn ObjectStore>,
    publisher: Option<Arc<dyn Publisher>>,
    rules: RuleSource,
    engine: ExtractionEngine,
    config: Arc<PipelineConfig>,
}

impl ProcessStage {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        publisher: Option<Arc<dyn Publisher>>,
        rules: RuleSource,
        engine: ExtractionEngine,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            publisher,
            rules,
            engine,
            config,
        }
    }

    /// Process one stored object
    #[instrument(skip(self), fields(source_bucket = %object.bucket, source_file = %object.name))]
    pub async fn process(&self, object: &ObjectRef) -> Result<ProcessOutcome> {
        let processed_bucket = self.config.require_processed_bucket()?;
        let rules = self.rules.rules().await?;

        info!(
            source_bucket = %object.bucket,
            source_file = %object.name,
            "Processing file: {}",
            object.name
        );

        let html = self.store.get_text(&object.bucket, &object.name).await?;
        let document = RawDocument::from_object(object.clone(), html);
        let extracted = self.engine.extract(&document, &rules);

        let json = extracted.extraction.to_json_pretty()?;
        let destination = ObjectRef::new(processed_bucket, processed_key(&object.name));
        self.store
            .put(
                &destination.bucket,
                &destination.name,
                json.into_bytes(),
                JSON_CONTENT_TYPE,
            )
            .await?;

        let published = match extracted.extraction.next_page_url() {
            Some(next_page_url) => self.publish_next_page(next_page_url).await,
            None => None,
        };

        match &extracted.extraction {
            Extraction::Links(links) => info!(
                source_file = %object.name,
                destination_bucket = %destination.bucket,
                destination_file = %destination.name,
                links_found = links.result_urls.len(),
                next_page_found = links.next_page_url.is_some(),
                policy = %extracted.policy,
                "Successfully processed {} and uploaded to gs://{}",
                object.name,
                destination
            ),
            Extraction::Headings(headings) => info!(
                source_file = %object.name,
                destination_bucket = %destination.bucket,
                destination_file = %destination.name,
                headings_found = headings.headings.len(),
                "Successfully processed {} and uploaded to gs://{}",
                object.name,
                destination
            ),
        }

        Ok(ProcessOutcome {
            source: object.clone(),
            destination,
            policy: extracted.policy,
            extraction: extracted.extraction,
            published,
        })
    }

    /// Publish a next-page request if a topic and a publisher are both present.
    /// Failures are logged; the processed JSON is already written by now.
    async fn publish_next_page(&self, next_page_url: &str) -> Option<String> {
        let (Some(topic), Some(publisher)) = (&self.config.crawl_topic, &self.publisher) else {
            return None;
        };

        match publisher.publish(topic, &CrawlRequest::new(next_page_url)).await {
            Ok(message_id) => {
                info!(
                    next_page_url,
                    topic = %topic,
                    message_id = message_id.as_deref().unwrap_or("unknown"),
                    "Published next page to {}",
                    topic
                );
                Some(message_id.unwrap_or_default())
            }
            Err(e) => {
                let e = Error::from(e);
                warn!(
                    next_page_url,
                    topic = %topic,
                    error = %e,
                    error_type = e.kind(),
                    "Failed to publish next page"
                );
                None
            }
        }
    }

    /// Process an object and log any failure with its context
    pub async fn handle_object(&self, object: &ObjectRef) -> Option<ProcessOutcome> {
        match self.process(object).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log_failure(&e, Some(object));
                None
            }
        }
    }

    /// Handle a raw storage notification. Outcomes are reported through logs
    /// and side effects only.
    pub async fn handle_event(&self, body: &[u8]) -> Option<ProcessOutcome> {
        if let Err(e) = self.config.require_processed_bucket() {
            error!(error_type = "configuration", "Configuration error: {}.", e);
            return None;
        }

        match parse_storage_event(body) {
            Ok(object) => self.handle_object(&object).await,
            Err(e) => {
                log_failure(&e.into(), None);
                None
            }
        }
    }
}

fn log_failure(e: &Error, object: Option<&ObjectRef>) {
    let source_file = object.map(|o| o.name.as_str()).unwrap_or("unknown");
    let source_bucket = object.map(|o| o.bucket.as_str()).unwrap_or("unknown");

    match e {
        Error::Json(_) | Error::Other(_) => error!(
            error = %e,
            error_type = e.kind(),
            source_file,
            source_bucket,
            "An unexpected error occurred during data processing."
        ),
        _ => error!(
            error = %e,
            error_type = e.kind(),
            source_file,
            source_bucket,
            "Error processing file."
        ),
    }
}
