//! Object storage tiers
//!
//! Both tiers of the system speak this interface: the origin bucket that
//! holds source objects and the cache bucket that holds materialized
//! variants keyed by canonical path. The S3 implementation classifies the
//! backend's "object absent" signal explicitly, because S3 without
//! `s3:ListBucket` answers missing keys with 403 rather than 404 and the
//! tiered resolver's single fallback transition hinges on that signal.

pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;

/// A fetched object, exclusively owned by one request's execution.
///
/// Fetched fresh on every request and discarded at the end of it; origin
/// bytes are never cached in-process.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    /// User metadata, copied verbatim to materialized variants
    pub metadata: HashMap<String, String>,
}

impl StoredObject {
    pub fn new(body: Bytes, content_type: Option<String>) -> Self {
        Self {
            body,
            content_type,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend's defined "object absent" signal; the only condition
    /// that triggers the PRIMARY → FALLBACK transition
    #[error("object absent: {key}")]
    Absent { key: String, status: Option<u16> },

    /// Any other storage failure; propagates to the client as-is
    #[error("storage request failed: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_absent(&self) -> bool {
        matches!(self, StorageError::Absent { .. })
    }
}

/// One storage tier (origin or cache bucket).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object by key.
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Persist an object under `key` with its serving headers. Last writer
    /// wins; concurrent writers for one key are not coordinated.
    async fn put(
        &self,
        key: &str,
        object: &StoredObject,
        cache_control: &str,
    ) -> Result<(), StorageError>;
}
