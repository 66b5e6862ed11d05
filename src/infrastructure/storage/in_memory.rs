//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::cache::CacheEntry;
use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    size_bytes: u64,
}

/// Thread-safe in-memory entry store
///
/// Keeps a running byte total updated under the same lock as the map, so
/// `size_bytes` is O(1). Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryCacheStorage {
    inner: RwLock<Inner>,
}

impl InMemoryCacheStorage {
    /// Creates a new empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStorage for InMemoryCacheStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.entries.get(key).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), DomainError> {
        let mut inner = self.inner.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let added = entry.size_bytes();

        if let Some(previous) = inner.entries.insert(entry.key().to_string(), entry) {
            inner.size_bytes = inner.size_bytes.saturating_sub(previous.size_bytes());
        }

        inner.size_bytes += added;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut inner = self.inner.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        match inner.entries.remove(key) {
            Some(removed) => {
                inner.size_bytes = inner.size_bytes.saturating_sub(removed.size_bytes());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.entries.contains_key(key))
    }

    async fn all_keys(&self) -> Result<Vec<String>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.entries.keys().cloned().collect())
    }

    async fn size_bytes(&self) -> Result<u64, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.size_bytes)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        inner.entries.clear();
        inner.size_bytes = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(key: &str, value: &str) -> CacheEntry {
        CacheEntry::new(key, value.as_bytes().to_vec(), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let storage = InMemoryCacheStorage::new();

        storage.set(entry("k1", "hello")).await.unwrap();

        let retrieved = storage.get("k1").await.unwrap().unwrap();
        assert_eq!(retrieved.value(), b"hello");
        assert!(storage.exists("k1").await.unwrap());
        assert!(storage.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_size_tracks_overwrites_and_deletes() {
        let storage = InMemoryCacheStorage::new();

        storage.set(entry("k1", "12345")).await.unwrap();
        storage.set(entry("k2", "123")).await.unwrap();
        assert_eq!(storage.size_bytes().await.unwrap(), 8);

        storage.set(entry("k1", "12")).await.unwrap();
        assert_eq!(storage.size_bytes().await.unwrap(), 5);

        assert!(storage.delete("k2").await.unwrap());
        assert_eq!(storage.size_bytes().await.unwrap(), 2);

        assert!(!storage.delete("k2").await.unwrap());
        assert_eq!(storage.size_bytes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_all_keys_and_clear() {
        let storage = InMemoryCacheStorage::new();

        storage.set(entry("a", "1")).await.unwrap();
        storage.set(entry("b", "2")).await.unwrap();

        let mut keys = storage.all_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        storage.clear().await.unwrap();
        assert!(storage.is_empty());
        assert_eq!(storage.size_bytes().await.unwrap(), 0);
    }
}
