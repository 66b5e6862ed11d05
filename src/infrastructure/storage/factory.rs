//! Storage factory for runtime storage selection

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;

use super::file::FileCacheStorage;
use super::in_memory::InMemoryCacheStorage;

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// One file per entry in a directory
    File,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "file" | "files" | "disk" | "fs" => Some(Self::File),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// File storage rooted at a directory
    File(PathBuf),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a file storage configuration
    pub fn file(directory: impl Into<PathBuf>) -> Self {
        Self::File(directory.into())
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::File(_) => StorageType::File,
        }
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a storage instance based on the configuration
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn CacheStorage>, DomainError> {
        match config {
            StorageConfig::InMemory => Ok(Arc::new(InMemoryCacheStorage::new())),
            StorageConfig::File(directory) => {
                let storage = FileCacheStorage::open(directory.clone()).await?;
                Ok(Arc::new(storage))
            }
        }
    }

    /// Creates an in-memory storage
    pub fn create_in_memory() -> Arc<InMemoryCacheStorage> {
        Arc::new(InMemoryCacheStorage::new())
    }
}
