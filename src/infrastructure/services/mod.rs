//! Cache services - orchestration, eviction, expiry and invalidation

mod cache_service;
mod deadline;
mod eviction_service;
mod factory;
mod invalidation_service;
mod ttl_service;

pub use cache_service::{CacheStats, SemanticCacheDeps, SemanticCacheService, StoreOutcome};
pub use deadline::{within, DEFAULT_PORT_TIMEOUT};
pub use eviction_service::{order_candidates, EvictionOutcome, EvictionService};
pub use factory::{EmbeddingProviderType, SemanticCacheFactory};
pub use invalidation_service::{
    InvalidationService, EVICTION_REASON, SYSTEM_TRIGGER, TTL_EXPIRATION_REASON,
};
pub use ttl_service::{TtlService, REFRESH_FRACTION};
