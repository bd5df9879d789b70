//! Cloud Pub/Sub publisher over the REST API

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{CrawlRequest, PublishError, Publisher};

/// Default Pub/Sub endpoint
const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";

#[derive(Debug, Serialize)]
struct PublishBody {
    messages: Vec<PubsubMessage>,
}

#[derive(Debug, Serialize)]
struct PubsubMessage {
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes crawl requests to a Pub/Sub topic (`projects/{project}/topics/{topic}`)
#[derive(Debug, Clone)]
pub struct PubSubPublisher {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl PubSubPublisher {
    /// Create a publisher using a shared HTTP client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
        }
    }

    /// Point the publisher at another endpoint, such as the emulator
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    #[instrument(skip(self, request), level = "debug", fields(url = %request.url))]
    async fn publish(&self, topic: &str, request: &CrawlRequest) -> Result<Option<String>, PublishError> {
        let topic = topic.trim_matches('/');
        if topic.is_empty() || topic.contains(char::is_whitespace) {
            return Err(PublishError::InvalidTopic(topic.to_string()));
        }

        let body = PublishBody {
            messages: vec![PubsubMessage {
                data: STANDARD.encode(request.to_bytes()?),
            }],
        };

        let url = format!("{}/v1/{}:publish", self.endpoint, topic);
        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        debug!("Publishing to {}", topic);
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Publish API error: {} - {}", status, text);
            return Err(PublishError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: PublishResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(parsed.message_ids.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_publish() {
        let mut server = Server::new_async().await;
        let data = STANDARD.encode(br#"{"url":"https://example.com/page-2.html"}"#);
        let mock = server
            .mock("POST", "/v1/projects/test/topics/crawl:publish")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::Json(serde_json::json!({
                "messages": [{"data": data}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"messageIds": ["42"]}"#)
            .expect(1)
            .create_async()
            .await;

        let publisher = PubSubPublisher::new(Client::new())
            .with_endpoint(server.url())
            .with_token("test-token");

        let id = publisher
            .publish(
                "projects/test/topics/crawl",
                &CrawlRequest::new("https://example.com/page-2.html"),
            )
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("42"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_publish_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/projects/test/topics/missing:publish")
            .with_status(404)
            .with_body("Resource not found")
            .create_async()
            .await;

        let publisher = PubSubPublisher::new(Client::new()).with_endpoint(server.url());
        let result = publisher
            .publish("projects/test/topics/missing", &CrawlRequest::new("https://example.com"))
            .await;

        assert!(matches!(result, Err(PublishError::Api { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_invalid_topic() {
        let publisher = PubSubPublisher::new(Client::new());
        let result = publisher.publish(" ", &CrawlRequest::new("https://example.com")).await;
        assert!(matches!(result, Err(PublishError::InvalidTopic(_))));
    }
}
