//! PMP Semantic Cache
//!
//! A single-node response cache that decides whether a previously computed
//! answer may be reused for a new query:
//! - Exact reuse through a normalized, context-aware cache key
//! - Lexical reuse through BM25 candidates and cheap match rules
//! - Semantic reuse through fused dense + sparse retrieval
//! - Bounded capacity with LRU, LFU or FIFO eviction
//! - TTL expiry with sliding renewal and invalidation events

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{CacheResult, DomainError};
pub use infrastructure::services::{SemanticCacheFactory, SemanticCacheService};
