//! # Pipeline Configuration Module
//!
//! Runtime configuration shared by both stages. Values come from the
//! environment (the way the stages are deployed) and can be overridden from
//! the command line. A builder is provided for embedding and tests.
//!
//! Required destinations are deliberately optional here: each stage checks
//! the bucket it needs when it is invoked, so a missing value surfaces as a
//! configuration error for that invocation instead of a startup crash.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::extraction::ExtractionMode;
use crate::keys::KeyStrategy;
use crate::storage::StorageBackend;

/// Default location of the per-domain selector rules
pub const DEFAULT_RULES_PATH: &str = "config.json";

/// Default timeout for page fetches in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Error type for configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is not present
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// A setting is present but cannot be used
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for both pipeline stages
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bucket receiving raw HTML from the scrape stage
    pub raw_bucket: Option<String>,

    /// Bucket receiving extraction JSON from the process stage
    pub processed_bucket: Option<String>,

    /// Topic that receives next-page crawl requests
    pub crawl_topic: Option<String>,

    /// URL scraped when a trigger does not carry one
    pub target_url: Option<String>,

    /// Path of the per-domain selector rules file
    pub rules_path: PathBuf,

    /// Scheme used to rebuild the base URL of a stored page
    pub base_url_scheme: String,

    /// Which extraction shape the process stage produces
    pub extraction_mode: ExtractionMode,

    /// How raw object keys are derived from URLs
    pub key_strategy: KeyStrategy,

    /// Timeout for a single page fetch
    pub fetch_timeout: Duration,

    /// Which object store implementation to use
    pub storage_backend: StorageBackend,

    /// Root directory for the local object store
    pub local_storage_root: PathBuf,

    /// Override for the Cloud Storage API endpoint
    pub gcs_endpoint: Option<String>,

    /// Override for the Pub/Sub API endpoint
    pub pubsub_endpoint: Option<String>,

    /// Bearer token for the Google APIs
    pub access_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_bucket: None,
            processed_bucket: None,
            crawl_topic: None,
            target_url: None,
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            base_url_scheme: "https".to_string(),
            extraction_mode: ExtractionMode::Links,
            key_strategy: KeyStrategy::Deterministic,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            storage_backend: StorageBackend::Local,
            local_storage_root: PathBuf::from(".pagechain/buckets"),
            gcs_endpoint: None,
            pubsub_endpoint: None,
            access_token: None,
        }
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Set the raw HTML bucket
    pub fn raw_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.raw_bucket = Some(bucket.into());
        self
    }

    /// Set the processed JSON bucket
    pub fn processed_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.processed_bucket = Some(bucket.into());
        self
    }

    /// Set the crawl queue topic
    pub fn crawl_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.crawl_topic = Some(topic.into());
        self
    }

    /// Set the default target URL
    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.config.target_url = Some(url.into());
        self
    }

    /// Set the selector rules path
    pub fn rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rules_path = path.into();
        self
    }

    /// Set the base URL scheme
    pub fn base_url_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.base_url_scheme = scheme.into();
        self
    }

    /// Set the extraction mode
    pub fn extraction_mode(mut self, mode: ExtractionMode) -> Self {
        self.config.extraction_mode = mode;
        self
    }

    /// Set the key strategy
    pub fn key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.config.key_strategy = strategy;
        self
    }

    /// Set the fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Set the storage backend
    pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
        self.config.storage_backend = backend;
        self
    }

    /// Set the local storage root
    pub fn local_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.local_storage_root = root.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl PipelineConfig {
    /// Create a new builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Load the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name: "FETCH_TIMEOUT_SECS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.fetch_timeout,
        };

        let base_url_scheme = get("BASE_URL_SCHEME").unwrap_or(defaults.base_url_scheme);
        if !matches!(base_url_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "BASE_URL_SCHEME",
                value: base_url_scheme,
                reason: "expected http or https".to_string(),
            });
        }

        Ok(Self {
            raw_bucket: get("RAW_DATA_BUCKET"),
            processed_bucket: get("PROCESSED_DATA_BUCKET"),
            crawl_topic: get("CRAWL_QUEUE_TOPIC"),
            target_url: get("TARGET_URL"),
            rules_path: get("SCRAPER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.rules_path),
            base_url_scheme,
            extraction_mode: parse_setting("EXTRACTION_MODE", get("EXTRACTION_MODE"))?
                .unwrap_or(defaults.extraction_mode),
            key_strategy: parse_setting("KEY_STRATEGY", get("KEY_STRATEGY"))?
                .unwrap_or(defaults.key_strategy),
            fetch_timeout,
            storage_backend: parse_setting("STORAGE_BACKEND", get("STORAGE_BACKEND"))?
                .unwrap_or(defaults.storage_backend),
            local_storage_root: get("LOCAL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_storage_root),
            gcs_endpoint: get("GCS_ENDPOINT"),
            pubsub_endpoint: get("PUBSUB_ENDPOINT"),
            access_token: get("GOOGLE_OAUTH_ACCESS_TOKEN"),
        })
    }

    /// The raw bucket, or a configuration error naming the variable
    pub fn require_raw_bucket(&self) -> Result<&str, ConfigError> {
        self.raw_bucket
            .as_deref()
            .ok_or(ConfigError::Missing("RAW_DATA_BUCKET"))
    }

    /// The processed bucket, or a configuration error naming the variable
    pub fn require_processed_bucket(&self) -> Result<&str, ConfigError> {
        self.processed_bucket
            .as_deref()
            .ok_or(ConfigError::Missing("PROCESSED_DATA_BUCKET"))
    }
}

fn parse_setting<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = String>,
{
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|reason| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.raw_bucket.is_none());
        assert!(config.processed_bucket.is_none());
        assert!(config.crawl_topic.is_none());
        assert_eq!(config.rules_path, PathBuf::from("config.json"));
        assert_eq!(config.base_url_scheme, "https");
        assert_eq!(config.extraction_mode, ExtractionMode::Links);
        assert_eq!(config.key_strategy, KeyStrategy::Deterministic);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_backend, StorageBackend::Local);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("RAW_DATA_BUCKET", "raw"),
            ("PROCESSED_DATA_BUCKET", "processed"),
            ("CRAWL_QUEUE_TOPIC", "projects/p/topics/crawl"),
            ("TARGET_URL", "https://example.com"),
            ("SCRAPER_CONFIG", "/etc/pagechain/rules.json"),
            ("BASE_URL_SCHEME", "http"),
            ("EXTRACTION_MODE", "headings"),
            ("KEY_STRATEGY", "randomized"),
            ("FETCH_TIMEOUT_SECS", "3"),
            ("STORAGE_BACKEND", "gcs"),
        ]))
        .unwrap();

        assert_eq!(config.require_raw_bucket().unwrap(), "raw");
        assert_eq!(config.require_processed_bucket().unwrap(), "processed");
        assert_eq!(config.crawl_topic.as_deref(), Some("projects/p/topics/crawl"));
        assert_eq!(config.target_url.as_deref(), Some("https://example.com"));
        assert_eq!(config.rules_path, PathBuf::from("/etc/pagechain/rules.json"));
        assert_eq!(config.base_url_scheme, "http");
        assert_eq!(config.extraction_mode, ExtractionMode::Headings);
        assert_eq!(config.key_strategy, KeyStrategy::Randomized);
        assert_eq!(config.fetch_timeout, Duration::from_secs(3));
        assert_eq!(config.storage_backend, StorageBackend::Gcs);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config =
            PipelineConfig::from_lookup(lookup(&[("RAW_DATA_BUCKET", "  "), ("CRAWL_QUEUE_TOPIC", "")]))
                .unwrap();
        assert!(matches!(
            config.require_raw_bucket(),
            Err(ConfigError::Missing("RAW_DATA_BUCKET"))
        ));
        assert!(config.crawl_topic.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = PipelineConfig::from_lookup(lookup(&[("EXTRACTION_MODE", "tables")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "EXTRACTION_MODE", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("FETCH_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "FETCH_TIMEOUT_SECS", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("BASE_URL_SCHEME", "ftp")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BASE_URL_SCHEME", .. }));
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::builder()
            .raw_bucket("raw")
            .processed_bucket("processed")
            .crawl_topic("crawl")
            .extraction_mode(ExtractionMode::Headings)
            .fetch_timeout(Duration::from_secs(1))
            .build();

        assert_eq!(config.raw_bucket.as_deref(), Some("raw"));
        assert_eq!(config.processed_bucket.as_deref(), Some("processed"));
        assert_eq!(config.crawl_topic.as_deref(), Some("crawl"));
        assert_eq!(config.extraction_mode, ExtractionMode::Headings);
        assert_eq!(config.fetch_timeout, Duration::from_secs(1));
    }
}
