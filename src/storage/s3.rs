use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::{debug, info};

use super::BlobStore;
use crate::error::StorageError;

/// Amazon S3 backend.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    /// Load credentials from the standard AWS chain and pin the region.
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::load_from_env()
            .await
            .to_builder()
            .region(aws_config::Region::new(region.to_string()))
            .build();
        info!(region, "S3 blob store ready");
        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let transport = |reason: String| StorageError::Transport {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    transport(DisplayErrorContext(&e).to_string())
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| transport(format!("failed to read object body: {e}")))?
            .into_bytes();

        debug!(bucket, key, size = bytes.len(), "Fetched object from S3");
        Ok(bytes.to_vec())
    }
}
