//! Storage port

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::cache::CacheEntry;
use crate::domain::DomainError;

/// Size-aware key/value store for cache entries
///
/// Adapters hold no expiry or eviction logic; those decisions belong to the
/// services layered on top. Every operation may fail with
/// [`DomainError::Storage`].
#[async_trait]
pub trait CacheStorage: Send + Sync + Debug {
    /// Retrieves an entry by key
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, DomainError>;

    /// Inserts or replaces the entry under its key
    async fn set(&self, entry: CacheEntry) -> Result<(), DomainError>;

    /// Deletes an entry, returns true if it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Checks if an entry exists
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Lists every stored key
    async fn all_keys(&self) -> Result<Vec<String>, DomainError>;

    /// Total size in bytes of all stored values
    async fn size_bytes(&self) -> Result<u64, DomainError>;

    /// Removes every entry
    async fn clear(&self) -> Result<(), DomainError>;
}
