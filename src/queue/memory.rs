//! Publisher that records messages in memory

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{CrawlRequest, PublishError, Publisher};

/// Records every published request; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    messages: Arc<Mutex<Vec<(String, CrawlRequest)>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far as `(topic, request)` pairs
    pub fn messages(&self) -> Vec<(String, CrawlRequest)> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, request: &CrawlRequest) -> Result<Option<String>, PublishError> {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.push((topic.to_string(), request.clone()));
        Ok(Some(messages.len().to_string()))
    }
}
