pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

pub use memory::MemoryStore;
pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("requested range {start}-{end} not satisfiable for object of {size} bytes")]
    InvalidRange { start: u64, end: u64, size: u64 },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("could not presign URL for {key}: {reason}")]
    Presign { key: String, reason: String },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata from a HEAD request.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Blob backing store for uploaded media.
///
/// `S3Store` talks to any S3-compatible service (DigitalOcean Spaces, MinIO,
/// AWS). `MemoryStore` keeps everything in a map and backs the tests and
/// local runs without credentials.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()>;

    async fn head_object(&self, key: &str) -> StorageResult<ObjectMeta>;

    async fn get_object(&self, key: &str) -> StorageResult<StoredObject>;

    /// Fetch bytes `start..=end`. Callers clamp `end` to the object size first.
    async fn get_object_range(&self, key: &str, start: u64, end: u64)
        -> StorageResult<StoredObject>;

    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    async fn list_objects(&self) -> StorageResult<Vec<ObjectInfo>>;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

pub fn open_store(config: &StorageConfig) -> Arc<dyn MediaStore> {
    match config.backend {
        StorageBackend::S3 => {
            tracing::info!(bucket = %config.bucket, endpoint = %config.endpoint_url(), "using S3 storage");
            Arc::new(S3Store::new(config))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; uploads are lost on restart");
            Arc::new(MemoryStore::new())
        }
    }
}
