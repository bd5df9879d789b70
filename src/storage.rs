//! # Object Storage
//!
//! Both stages talk to object storage through the [`ObjectStore`] trait:
//! the scrape stage writes raw HTML, the process stage reads it back and
//! writes extraction JSON next to it in another bucket.
//!
//! ## Backends
//!
//! - [`LocalObjectStore`]: buckets are directories under a root path
//! - [`GcsObjectStore`]: Google Cloud Storage JSON API
//! - [`MemoryObjectStore`]: in-process map for tests and dry runs

mod gcs;
mod local;
mod memory;

pub use gcs::GcsObjectStore;
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PipelineConfig;

/// Content type of stored raw pages
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Content type of stored extraction results
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("access denied: {bucket}/{key}")]
    Forbidden { bucket: String, key: String },

    #[error("object {bucket}/{key} is not valid UTF-8 text")]
    Decode { bucket: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// A named object inside a bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}

/// Read and write access to named blobs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Write an object, replacing any previous version
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Read an object as UTF-8 text
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        let bytes = self.get(bucket, key).await?;
        String::from_utf8(bytes).map_err(|_| StorageError::Decode {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

/// Which object store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Local,
    Gcs,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "gcs" => Ok(Self::Gcs),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown storage backend '{}', expected local, gcs or memory",
                other
            )),
        }
    }
}

/// Build the configured object store around a shared HTTP client
pub fn build_store(config: &PipelineConfig, client: reqwest::Client) -> Arc<dyn ObjectStore> {
    match config.storage_backend {
        StorageBackend::Local => Arc::new(LocalObjectStore::new(&config.local_storage_root)),
        StorageBackend::Gcs => {
            let mut store = GcsObjectStore::new(client);
            if let Some(endpoint) = &config.gcs_endpoint {
                store = store.with_endpoint(endpoint.clone());
            }
            if let Some(token) = &config.access_token {
                store = store.with_token(token.clone());
            }
            Arc::new(store)
        }
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
    }
}
