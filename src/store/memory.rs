//! In-memory store
//!
//! Process-local backend used by tests and by the server when no data
//! directory is configured.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// HashMap-backed key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write();
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        store.set("a", b"1".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.len(), 1);

        store.delete("a").await.unwrap();
        assert!(store.is_empty());

        // Deleting again is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::new();

        // Absent key only matches `None`
        assert!(!store.compare_and_swap("k", Some(b"x"), b"y".to_vec()).await.unwrap());
        assert!(store.compare_and_swap("k", None, b"v1".to_vec()).await.unwrap());

        // Stale expectation is rejected
        assert!(!store.compare_and_swap("k", None, b"v2".to_vec()).await.unwrap());
        assert!(!store.compare_and_swap("k", Some(b"v0"), b"v2".to_vec()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));

        assert!(store.compare_and_swap("k", Some(b"v1"), b"v2".to_vec()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }
}
