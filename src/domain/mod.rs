//! Domain layer - Cache value objects, policies and ports

pub mod cache;
pub mod clock;
pub mod embedding;
pub mod error;
pub mod events;
pub mod index;
pub mod metrics;
pub mod normalization;
pub mod storage;

pub use cache::{
    derive_cache_key, CacheContext, CacheEntry, CacheHit, CacheInvalidationEvent, CachePolicy,
    CacheResult, EntryMetadata, EvictionPolicy, HitKind, InvalidationStrategy, SemanticMatch,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use embedding::{cosine_similarity, EmbeddingGenerator};
pub use error::DomainError;
pub use events::{EventHandler, EventPublisher};
pub use index::{IndexMetadata, LexicalIndex, LexicalScore, SemanticIndex};
pub use metrics::CacheMetrics;
pub use normalization::{MatchReason, QueryNormalizer};
pub use storage::CacheStorage;
