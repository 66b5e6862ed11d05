//! Storage infrastructure - Cache entry store implementations

mod factory;
mod file;
mod in_memory;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use file::FileCacheStorage;
pub use in_memory::InMemoryCacheStorage;
