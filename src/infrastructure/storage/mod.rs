use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod s3;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StorageError(pub String);

/// The two object-storage operations the pipeline needs. Kept this narrow
/// so tests can swap in an in-memory store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
