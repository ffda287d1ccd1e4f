//! File-backed store
//!
//! One file per key inside a data directory. File names are the hex
//! encoding of the key so arbitrary key text never escapes the directory.
//! Writes land in a temp file and are renamed over the target.
//!
//! A directory belongs to one open store at a time: `open` takes an
//! exclusive lock on a `LOCK` file inside it and holds it until the store
//! is dropped. In-process callers are serialised by an async mutex.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const VALUE_EXTENSION: &str = "val";
const LOCK_FILE: &str = "LOCK";

/// Directory-backed key-value store
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// Serialises mutations so compare-and-swap sees a stable value.
    write_lock: Mutex<()>,
    /// Lock file for exclusive access to `dir`.
    _lock_file: File,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// Fails with [`StoreError::Locked`] while another store, in this or
    /// any other process, has the directory open.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let lock_file = Self::acquire_lock(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened file store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    fn acquire_lock(dir: &Path) -> Result<File, StoreError> {
        let lock_file = File::create(dir.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked(dir.to_path_buf()))?;
        Ok(lock_file)
    }

    /// Root directory of the store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(key.as_bytes()), VALUE_EXTENSION))
    }

    async fn read_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write_value(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_path, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read_value(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_value(key, &value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_value(key).await?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.write_value(key, &value).await?;
        Ok(true)
    }
}
