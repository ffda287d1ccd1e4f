//! Key-Value Store
//!
//! The persistence seam for polls. Backends offer independent get/set/delete
//! on opaque byte values; nothing here spans more than one key.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("Data directory {} is in use by another store", .0.display())]
    Locked(std::path::PathBuf),
}

/// Byte-oriented key-value store.
///
/// Implementations must make each single-key operation atomic with respect
/// to readers of that key. No ordering is promised across keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Conditionally replace the value under `key`.
    ///
    /// Writes `value` only when the current value equals `expected`
    /// (`None` meaning the key is absent) and returns whether the write
    /// happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, StoreError> {
        let _ = (key, expected, value);
        Err(StoreError::Unsupported("compare_and_swap"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainStore;

    #[async_trait]
    impl KeyValueStore for PlainStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_compare_and_swap_unsupported_by_default() {
        let store = PlainStore;
        let result = store.compare_and_swap("k", None, b"v".to_vec()).await;
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Backend("disk on fire".to_string());
        assert_eq!(err.to_string(), "Backend error: disk on fire");
    }
}
