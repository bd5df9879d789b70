//! Google Cloud Storage over its JSON API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, instrument};
use url::Url;

use super::{ObjectStore, StorageError};

/// Default Cloud Storage endpoint
const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Object store backed by Cloud Storage
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl GcsObjectStore {
    /// Create a store using a shared HTTP client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
        }
    }

    /// Point the store at another endpoint, such as an emulator
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn build_url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StorageError::InvalidKey(format!("invalid endpoint {}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidKey(format!("endpoint {} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response, bucket: &str, key: &str) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(StorageError::Forbidden {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => {
                let message = response.text().await.unwrap_or_default();
                error!("Storage API error: {} - {}", status, message);
                Err(StorageError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        // The object name is a single path segment, so '/' inside it is encoded
        let mut url = self.build_url(&["storage", "v1", "b", bucket, "o", key])?;
        url.query_pairs_mut().append_pair("alt", "media");

        debug!("Downloading gs://{}/{}", bucket, key);
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = Self::check(response, bucket, key).await?;
        Ok(response.bytes().await?.to_vec())
    }

    #[instrument(skip(self, body), level = "debug", fields(size = body.len()))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut url = self.build_url(&["upload", "storage", "v1", "b", bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        debug!("Uploading gs://{}/{}", bucket, key);
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let response = self.authorize(request).send().await?;
        Self::check(response, bucket, key).await?;
        Ok(())
    }
}
