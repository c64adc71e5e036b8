//! Blob storage for raw inbound messages.
//!
//! Mail arrives as an object keyed by message id inside a bucket. The
//! [`BlobStore`] trait is the only thing the pipeline sees; S3 is the
//! production backend, the spool directory and in-memory map serve local
//! runs and tests.

mod fs;
mod memory;
mod s3;

use async_trait::async_trait;

use crate::config::BlobStoreConfig;
use crate::error::StorageError;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

/// Read-only access to stored message bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the full object at `bucket`/`key`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the store selected by configuration.
pub async fn connect(config: &BlobStoreConfig) -> Box<dyn BlobStore> {
    match config {
        BlobStoreConfig::S3 { region } => Box::new(S3BlobStore::connect(region).await),
        BlobStoreConfig::Spool { root } => Box::new(FsBlobStore::new(root.clone())),
    }
}
