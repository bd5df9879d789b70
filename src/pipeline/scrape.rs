//! Scrape stage: fetch one page and store its raw HTML

use std::sync::Arc;

use tracing::{error, info, instrument};

use super::StageResponse;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::fetcher::{parse_target, Fetcher};
use crate::storage::{ObjectRef, ObjectStore, HTML_CONTENT_TYPE};
use crate::trigger::scrape_target;

/// A page that was fetched and stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub url: String,
    pub object: ObjectRef,
    pub bytes: usize,
}

/// Fetches pages and writes them to the raw bucket
#[derive(Clone)]
pub struct ScrapeStage {
    fetcher: Fetcher,
    store: Arc<dyn ObjectStore>,
    config: Arc<PipelineConfig>,
}

impl ScrapeStage {
    pub fn new(fetcher: Fetcher, store: Arc<dyn ObjectStore>, config: Arc<PipelineConfig>) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Fetch `url` and store the HTML under its derived key
    #[instrument(skip(self))]
    pub async fn scrape(&self, url: &str) -> Result<ScrapeOutcome> {
        let bucket = self.config.require_raw_bucket()?;
        let target = parse_target(url)?;

        let document = self.fetcher.fetch(&target).await?;
        let key = self.config.key_strategy.raw_key(&target);
        let bytes = document.html.len();

        self.store
            .put(bucket, &key, document.html.into_bytes(), HTML_CONTENT_TYPE)
            .await?;

        let object = ObjectRef::new(bucket, key);
        info!(
            target_url = %target,
            destination_blob = %object,
            bytes,
            "Successfully scraped {} and uploaded to gs://{}",
            target,
            object
        );

        Ok(ScrapeOutcome {
            url: target.to_string(),
            object,
            bytes,
        })
    }

    /// Handle a push-delivered request body and report a status
    pub async fn handle_push(&self, body: &[u8]) -> StageResponse {
        // Configuration comes first: nothing is parsed or fetched without a destination
        if let Err(e) = self.config.require_raw_bucket() {
            let message = format!("Configuration error: {}.", e);
            error!(error_type = "configuration", "{}", message);
            return StageResponse::error(500, message);
        }

        let url = match scrape_target(body, self.config.target_url.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                error!(error_type = "trigger", "{}", e);
                return StageResponse::error(400, e.to_string());
            }
        };

        match self.scrape(&url).await {
            Ok(outcome) => StageResponse::ok(format!(
                "Successfully scraped {} and uploaded to gs://{}",
                outcome.url, outcome.object
            )),
            Err(e) => {
                error!(
                    target_url = %url,
                    error = %e,
                    error_type = e.kind(),
                    "Scrape failed"
                );
                let message = match &e {
                    Error::Fetch(fetch) => format!("Error fetching URL {}: {}", url, fetch),
                    Error::Storage(storage) => format!("Error during GCS upload or other failure: {}", storage),
                    other => other.to_string(),
                };
                StageResponse::error(e.status_code(), message)
            }
        }
    }
}
