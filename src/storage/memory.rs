//! In-memory object store
//!
//! Backs local development and the test suites; behaves like the S3 tier
//! including the Absent classification for missing keys.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ObjectStore, StorageError, StoredObject};

#[derive(Debug)]
struct Stored {
    object: StoredObject,
    cache_control: String,
}

/// Map-backed store with interior mutability; cheap to share via `Arc`.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Stored>>,
    /// Status code reported for missing keys, mirroring the configured
    /// absent signal of the real backend
    absent_status: u16,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            absent_status: 403,
        }
    }

    /// Seed an object directly, bypassing cache-control bookkeeping.
    pub fn insert(&self, key: impl Into<String>, object: StoredObject) {
        self.objects.lock().unwrap().insert(
            key.into(),
            Stored {
                object,
                cache_control: String::new(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache-Control recorded with the last put for `key`.
    pub fn cache_control_of(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.cache_control.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.object.clone())
            .ok_or_else(|| StorageError::Absent {
                key: key.to_string(),
                status: Some(self.absent_status),
            })
    }

    async fn put(
        &self,
        key: &str,
        object: &StoredObject,
        cache_control: &str,
    ) -> Result<(), StorageError> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Stored {
                object: object.clone(),
                cache_control: cache_control.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_missing_key_reports_absent() {
        let store = MemoryObjectStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_absent());
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let store = MemoryObjectStore::new();
        let object = StoredObject::new(Bytes::from_static(b"abc"), Some("image/png".into()));
        store.put("a/original", &object, "max-age=60").await.unwrap();

        let fetched = store.get("a/original").await.unwrap();
        assert_eq!(fetched.body, Bytes::from_static(b"abc"));
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
        assert_eq!(
            store.cache_control_of("a/original").as_deref(),
            Some("max-age=60")
        );
    }
}
