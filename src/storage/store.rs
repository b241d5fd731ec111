//! Key-value persistence services backing the repository.
//!
//! The store is opaque to the containers: it keeps whole records by key and
//! knows nothing about their layout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use super::error::StorageResult;
use super::key::ComponentKey;

/// Persistent object store used by project components.
pub trait PersistentStore: Send + Sync {
    /// Store a record, replacing any previous value for the key.
    fn put(&self, key: &ComponentKey, record: Vec<u8>) -> StorageResult<()>;

    /// Read a record by key. `Ok(None)` when nothing was stored.
    fn get(&self, key: &ComponentKey) -> StorageResult<Option<Arc<[u8]>>>;

    /// Remove a record. Returns whether something was removed.
    fn remove(&self, key: &ComponentKey) -> StorageResult<bool>;
}

/// In-memory store, used for tests and transient projects.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn put(&self, key: &ComponentKey, record: Vec<u8>) -> StorageResult<()> {
        self.records.insert(key.storage_key(), record.into());
        Ok(())
    }

    fn get(&self, key: &ComponentKey) -> StorageResult<Option<Arc<[u8]>>> {
        Ok(self
            .records
            .get(&key.storage_key())
            .map(|r| r.value().clone()))
    }

    fn remove(&self, key: &ComponentKey) -> StorageResult<bool> {
        Ok(self.records.remove(&key.storage_key()).is_some())
    }
}

/// One file per record under a base directory.
///
/// File names are the SHA-256 of the storage key so unit names never need
/// escaping. Writes go through a temp file in the same directory and are
/// renamed into place.
#[derive(Debug)]
pub struct DirectoryStore {
    base_path: PathBuf,
}

impl DirectoryStore {
    /// Open (creating if needed) a store rooted at `base_path`.
    pub fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, key: &ComponentKey) -> PathBuf {
        let digest = Sha256::digest(key.storage_key().as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.base_path.join(format!("{name}.rec"))
    }
}

impl PersistentStore for DirectoryStore {
    fn put(&self, key: &ComponentKey, record: Vec<u8>) -> StorageResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.base_path)?;
        tmp.write_all(&record)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.record_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn get(&self, key: &ComponentKey) -> StorageResult<Option<Arc<[u8]>>> {
        match std::fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(bytes.into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &ComponentKey) -> StorageResult<bool> {
        match std::fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ComponentKind;
    use tempfile::TempDir;

    fn key(unit: &str) -> ComponentKey {
        ComponentKey::new(unit, ComponentKind::FileRegistry)
    }

    #[test]
    fn test_memory_store_put_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get(&key("a")).unwrap().is_none());

        store.put(&key("a"), vec![1, 2, 3]).unwrap();
        assert_eq!(&*store.get(&key("a")).unwrap().unwrap(), &[1, 2, 3]);
        assert_eq!(store.len(), 1);

        assert!(store.remove(&key("a")).unwrap());
        assert!(!store.remove(&key("a")).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_directory_store_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = DirectoryStore::open(temp_dir.path()).unwrap();
            store.put(&key("unit one"), vec![4, 5]).unwrap();
            // Overwrite
            store.put(&key("unit one"), vec![6]).unwrap();
        }

        let store = DirectoryStore::open(temp_dir.path()).unwrap();
        assert_eq!(&*store.get(&key("unit one")).unwrap().unwrap(), &[6]);
        assert!(store.get(&key("other")).unwrap().is_none());
    }

    #[test]
    fn test_directory_store_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(temp_dir.path().join("nested/repo")).unwrap();

        store.put(&key("u"), vec![1]).unwrap();
        assert!(store.remove(&key("u")).unwrap());
        assert!(!store.remove(&key("u")).unwrap());
        assert!(store.get(&key("u")).unwrap().is_none());
    }
}
