//! Storage domain - durable key/value port for cache entries

mod repository;

pub use repository::CacheStorage;

#[cfg(test)]
pub use repository::mock::MockCacheStorage;
