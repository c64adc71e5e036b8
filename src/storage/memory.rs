use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::BlobStore;
use crate::error::StorageError;

/// In-process store, keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((bucket.to_string(), key.to_string()), bytes.into());
    }

    pub fn with_object(self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(bucket, key, bytes);
        self
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
