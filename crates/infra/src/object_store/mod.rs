//! Blob storage behind the invoice audio keys.
//!
//! The trait carries both direct transfer (worker download, multipart
//! upload) and presigned URLs for browser-side transfer.

mod in_memory;
mod s3;

pub use in_memory::InMemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// URL a client can PUT the object to, valid for `ttl`.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError>;

    /// URL a client can GET the object from, valid for `ttl`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError>;
}
