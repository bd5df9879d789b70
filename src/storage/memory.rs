//! In-process object store
//!
//! Keeps objects in a shared map and remembers the content type each one was
//! written with. Clones share the same objects, so a test can hand one clone
//! to a stage and inspect the other afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ObjectRef, ObjectStore, StorageError};

/// A stored object and the content type it was written with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<ObjectRef, StoredObject>>>,
    fail_writes: Arc<Mutex<Option<String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with an API error carrying `message`
    pub fn fail_writes(&self, message: impl Into<String>) {
        *lock(&self.fail_writes) = Some(message.into());
    }

    /// Look up an object without going through the trait
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        lock(&self.objects).get(&ObjectRef::new(bucket, key)).cloned()
    }

    /// Every stored object reference, sorted
    pub fn keys(&self) -> Vec<ObjectRef> {
        let mut keys: Vec<ObjectRef> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.object(bucket, key)
            .map(|object| object.body)
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if let Some(message) = lock(&self.fail_writes).clone() {
            return Err(StorageError::Api {
                status: 503,
                message,
            });
        }

        lock(&self.objects).insert(
            ObjectRef::new(bucket, key),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
