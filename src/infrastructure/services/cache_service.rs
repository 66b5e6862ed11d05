//! Semantic cache orchestration
//!
//! `resolve` walks normalize → exact lookup → lexical shortcut → hybrid
//! retrieval and never fails: port errors are logged, counted and reported
//! as a miss. `store` enforces capacity under a single write gate shared with
//! every other mutating path, so concurrent writers cannot jointly overshoot
//! `max_size_bytes`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::deadline::{within, DEFAULT_PORT_TIMEOUT};
use super::eviction_service::EvictionService;
use super::invalidation_service::{InvalidationService, EVICTION_REASON, TTL_EXPIRATION_REASON};
use super::ttl_service::TtlService;
use crate::domain::cache::{
    derive_cache_key, CacheContext, CacheEntry, CacheInvalidationEvent, CachePolicy, CacheResult,
    EvictionPolicy, HitKind, INTENT_TAG,
};
use crate::domain::clock::Clock;
use crate::domain::embedding::EmbeddingGenerator;
use crate::domain::events::{EventHandler, EventPublisher};
use crate::domain::index::IndexMetadata;
use crate::domain::metrics::CacheMetrics;
use crate::domain::normalization::QueryNormalizer;
use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;
use crate::infrastructure::retrieval::HybridRetriever;

const STORE_TRIGGER: &str = "store";

/// Ports the cache is composed from
#[derive(Debug, Clone)]
pub struct SemanticCacheDeps {
    pub storage: Arc<dyn CacheStorage>,
    pub embedding: Arc<dyn EmbeddingGenerator>,
    pub retriever: Arc<HybridRetriever>,
    pub metrics: Arc<dyn CacheMetrics>,
    pub publisher: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreOutcome {
    pub key: String,
    pub evicted_keys: Vec<String>,
}

/// Point-in-time view of the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
    pub max_size_bytes: u64,
    pub eviction_policy: EvictionPolicy,
    pub metrics: BTreeMap<String, f64>,
}

/// A reusable entry found by one of the lookup stages
struct Found {
    entry: CacheEntry,
    kind: HitKind,
    similarity: Option<f32>,
    confidence: Option<f32>,
}

#[derive(Debug)]
pub struct SemanticCacheService {
    storage: Arc<dyn CacheStorage>,
    embedding: Arc<dyn EmbeddingGenerator>,
    retriever: Arc<HybridRetriever>,
    metrics: Arc<dyn CacheMetrics>,
    publisher: Arc<dyn EventPublisher>,
    normalizer: QueryNormalizer,
    policy: CachePolicy,
    ttl: TtlService,
    eviction: EvictionService,
    invalidation: InvalidationService,
    port_timeout: Duration,
    write_gate: Mutex<()>,
}

impl SemanticCacheService {
    pub fn new(deps: SemanticCacheDeps, policy: CachePolicy) -> Self {
        let ttl = TtlService::new(deps.clock.clone());
        let eviction = EvictionService::new(
            deps.storage.clone(),
            policy.eviction_policy(),
            policy.max_size_bytes(),
        );
        let invalidation = InvalidationService::new(
            deps.storage.clone(),
            deps.retriever.clone(),
            deps.publisher.clone(),
            deps.clock,
        );

        Self {
            storage: deps.storage,
            embedding: deps.embedding,
            retriever: deps.retriever,
            metrics: deps.metrics,
            publisher: deps.publisher,
            normalizer: QueryNormalizer::new(),
            policy,
            ttl,
            eviction,
            invalidation,
            port_timeout: DEFAULT_PORT_TIMEOUT,
            write_gate: Mutex::new(()),
        }
    }

    /// Bound every storage, embedding and index call
    pub fn with_port_timeout(mut self, port_timeout: Duration) -> Self {
        self.port_timeout = port_timeout;
        self.eviction = self.eviction.with_port_timeout(port_timeout);
        self.invalidation = self.invalidation.with_port_timeout(port_timeout);
        self
    }

    pub fn with_normalizer(mut self, normalizer: QueryNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Key under which `query` is stored for `context`
    pub fn cache_key(&self, query: &str, context: Option<&CacheContext>) -> Result<String, DomainError> {
        derive_cache_key(&self.normalizer.normalize(query), context)
    }

    /// Look up a reusable response; failures degrade to a miss
    #[instrument(skip(self, context))]
    pub async fn resolve(&self, query: &str, context: Option<&CacheContext>) -> CacheResult {
        let started = Instant::now();

        let found = match self.lookup(query, context).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                self.metrics.record_error(e.kind());
                None
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match found {
            Some(found) => {
                self.metrics.record_hit(found.kind);
                debug!(kind = found.kind.as_str(), key = %found.entry.key(), "Cache hit");

                let key = found.entry.key().to_string();
                let value = found.entry.into_value();

                match found.kind {
                    HitKind::Exact => CacheResult::exact_hit(value, key, elapsed_ms),
                    kind => CacheResult::similar_hit(
                        value,
                        key,
                        kind,
                        found.similarity,
                        found.confidence,
                        elapsed_ms,
                    ),
                }
            }
            None => {
                self.metrics.record_miss();
                CacheResult::miss(elapsed_ms)
            }
        }
    }

    /// Store a response for `query`
    ///
    /// `ttl_seconds` falls back to the policy default. Values larger than the
    /// capacity, or writes that eviction cannot make room for, are rejected
    /// with [`DomainError::PolicyViolation`].
    #[instrument(skip(self, value, context), fields(size = value.len()))]
    pub async fn store(
        &self,
        query: &str,
        value: Vec<u8>,
        ttl_seconds: Option<u64>,
        context: Option<&CacheContext>,
    ) -> Result<StoreOutcome, DomainError> {
        let normalized = self.normalizer.normalize(query);
        let key = derive_cache_key(&normalized, context)?;
        let max_size = self.policy.max_size_bytes();
        let entry_size = value.len() as u64;

        if entry_size > max_size {
            return Err(DomainError::policy_violation(format!(
                "Entry of {} bytes exceeds cache capacity of {} bytes",
                entry_size, max_size
            )));
        }

        let mut entry = CacheEntry::new(key.clone(), value, self.ttl.now())?
            .with_normalized_query(normalized.clone())
            .with_tag(INTENT_TAG, self.normalizer.extract_intent(query));

        if let Some(context) = context.filter(|c| !c.is_empty()) {
            entry = entry.with_context(context.clone());
        }

        let ttl_seconds = ttl_seconds.or(self.policy.default_ttl_seconds());

        if let (Some(ttl), Some(expires_at)) = (ttl_seconds, self.ttl.expiration_time(ttl_seconds)?) {
            entry = entry.with_renewed_expiry(ttl, expires_at)?;
        }

        let embedding = if self.policy.enable_semantic_caching() {
            match self.embed(&normalized).await {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!(key = %key, error = %e, "Embedding failed, entry will only be indexed lexically");
                    self.metrics.record_error(e.kind());
                    None
                }
            }
        } else {
            None
        };

        if let Some(ref embedding) = embedding {
            entry = entry.with_embedding(embedding.clone());
        }

        let _gate = self.write_gate.lock().await;

        let existing_size = within("storage.get", self.port_timeout, self.storage.get(&key))
            .await?
            .map(|existing| existing.size_bytes())
            .unwrap_or(0);
        let current_size = within("storage.size_bytes", self.port_timeout, self.storage.size_bytes())
            .await?
            .saturating_sub(existing_size);

        let outcome = self
            .eviction
            .evict_if_necessary(current_size, entry_size, Some(&key))
            .await?;

        for evicted in &outcome.evicted_keys {
            self.metrics.record_eviction(self.policy.eviction_policy());

            if let Err(e) = within("index.remove", self.port_timeout, self.retriever.remove(evicted)).await {
                warn!(key = %evicted, error = %e, "Failed to drop evicted key from indexes");
            }

            let event = CacheInvalidationEvent::immediate(
                evicted.as_str(),
                EVICTION_REASON,
                STORE_TRIGGER,
                1,
                self.ttl.now(),
            );

            if let Err(e) = self.publisher.publish(event).await {
                warn!(key = %evicted, error = %e, "Failed to publish eviction event");
            }
        }

        if current_size.saturating_sub(outcome.freed_bytes) + entry_size > max_size {
            return Err(DomainError::policy_violation(format!(
                "Could not free enough space for {} bytes ({} of {} bytes in use)",
                entry_size,
                current_size.saturating_sub(outcome.freed_bytes),
                max_size
            )));
        }

        within("storage.set", self.port_timeout, self.storage.set(entry)).await?;

        if self.policy.enable_semantic_caching() {
            self.index(&key, &normalized, embedding).await;
        }

        info!(key = %key, evicted = outcome.evicted_keys.len(), "Stored cache entry");

        Ok(StoreOutcome {
            key,
            evicted_keys: outcome.evicted_keys,
        })
    }

    /// Remove one entry by cache key; `Ok(false)` if it was not stored
    pub async fn invalidate(&self, key: &str, reason: &str, triggered_by: &str) -> Result<bool, DomainError> {
        let _gate = self.write_gate.lock().await;
        self.invalidation.invalidate_key(key, reason, triggered_by).await
    }

    pub async fn invalidate_prefix(
        &self,
        prefix: &str,
        reason: &str,
        triggered_by: &str,
    ) -> Result<usize, DomainError> {
        let _gate = self.write_gate.lock().await;
        self.invalidation
            .invalidate_by_prefix(prefix, reason, triggered_by)
            .await
    }

    pub async fn purge_expired(&self) -> Result<usize, DomainError> {
        let _gate = self.write_gate.lock().await;
        self.invalidation.purge_expired().await
    }

    /// Drop every entry and reset both indexes
    pub async fn clear(&self) -> Result<(), DomainError> {
        let _gate = self.write_gate.lock().await;

        within("storage.clear", self.port_timeout, self.storage.clear()).await?;

        if let Err(e) = within("index.clear", self.port_timeout, self.retriever.clear()).await {
            warn!(error = %e, "Failed to clear indexes");
        }

        Ok(())
    }

    /// Re-index live entries already held by storage, returns how many
    ///
    /// Indexes are in-process only; a persistent store opened by a new
    /// process needs this before lexical or semantic lookups can find its
    /// entries. Entries stored without an embedding are indexed lexically.
    pub async fn rebuild_indexes(&self) -> Result<usize, DomainError> {
        let _gate = self.write_gate.lock().await;

        let keys = within("storage.all_keys", self.port_timeout, self.storage.all_keys()).await?;
        let now = self.ttl.now();
        let mut indexed = 0;

        for key in keys {
            let entry = match self.fetch(&key).await {
                Ok(Some(entry)) if !entry.is_expired_at(now) => entry,
                Ok(_) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable entry while re-indexing");
                    continue;
                }
            };

            let Some(normalized) = entry.metadata().normalized_query() else {
                continue;
            };

            let embedding = entry
                .embedding()
                .filter(|e| e.len() == self.embedding.dimension())
                .map(<[f32]>::to_vec);

            self.index(&key, normalized, embedding).await;
            indexed += 1;
        }

        info!(indexed, "Rebuilt cache indexes from storage");

        Ok(indexed)
    }

    pub fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics.get_metrics()
    }

    pub async fn stats(&self) -> Result<CacheStats, DomainError> {
        let entries = within("storage.all_keys", self.port_timeout, self.storage.all_keys())
            .await?
            .len();
        let size_bytes = within("storage.size_bytes", self.port_timeout, self.storage.size_bytes()).await?;

        Ok(CacheStats {
            entries,
            size_bytes,
            max_size_bytes: self.policy.max_size_bytes(),
            eviction_policy: self.policy.eviction_policy(),
            metrics: self.metrics.get_metrics(),
        })
    }

    /// Register a handler for invalidation events
    pub fn subscribe(&self, handler: EventHandler) {
        self.publisher.subscribe(handler);
    }

    /// Sweep expired entries every `interval` until the handle is aborted
    pub fn spawn_purge_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                if let Err(e) = cache.purge_expired().await {
                    warn!(error = %e, "Background purge failed");
                    cache.metrics.record_error(e.kind());
                }
            }
        })
    }

    async fn lookup(&self, query: &str, context: Option<&CacheContext>) -> Result<Option<Found>, DomainError> {
        let normalized = self.normalizer.normalize(query);
        let key = derive_cache_key(&normalized, context)?;

        if let Some(entry) = self.fetch(&key).await? {
            if self.ttl.is_expired(&entry) {
                self.expire(&key).await;
            } else {
                return Ok(Some(Found {
                    entry: self.serve(entry).await,
                    kind: HitKind::Exact,
                    similarity: None,
                    confidence: None,
                }));
            }
        }

        if !self.policy.enable_semantic_caching() {
            return Ok(None);
        }

        if let Some(found) = self.lexical_lookup(query, &normalized, context).await? {
            return Ok(Some(found));
        }

        self.semantic_lookup(&normalized, context).await
    }

    /// Cheap match on the lexical candidates before paying for an embedding
    async fn lexical_lookup(
        &self,
        query: &str,
        normalized: &str,
        context: Option<&CacheContext>,
    ) -> Result<Option<Found>, DomainError> {
        let threshold = self.policy.semantic_match_threshold();
        let candidates = within(
            "index.search",
            self.port_timeout,
            self.retriever
                .lexical_index()
                .search(normalized, self.retriever.config().top_k),
        )
        .await?;

        for candidate in candidates {
            let Some(entry) = self.usable(&candidate.key, context).await? else {
                continue;
            };

            if let Some(reason) = self.normalizer.match_reason(query, &entry, threshold) {
                debug!(key = %candidate.key, ?reason, "Lexical candidate accepted");

                return Ok(Some(Found {
                    entry: self.serve(entry).await,
                    kind: HitKind::Lexical,
                    similarity: reason.score(),
                    confidence: reason.score(),
                }));
            }
        }

        Ok(None)
    }

    async fn semantic_lookup(
        &self,
        normalized: &str,
        context: Option<&CacheContext>,
    ) -> Result<Option<Found>, DomainError> {
        let threshold = self.policy.semantic_match_threshold();
        let embedding = self.embed(normalized).await?;

        let candidates = within(
            "index.retrieve",
            self.port_timeout,
            self.retriever.retrieve(normalized, &embedding, threshold),
        )
        .await?;

        for candidate in candidates.into_iter().filter(|c| c.confidence >= threshold) {
            if let Some(entry) = self.usable(&candidate.key, context).await? {
                return Ok(Some(Found {
                    entry: self.serve(entry).await,
                    kind: HitKind::Semantic,
                    similarity: Some(candidate.combined_score),
                    confidence: Some(candidate.confidence),
                }));
            }
        }

        Ok(None)
    }

    async fn fetch(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        within("storage.get", self.port_timeout, self.storage.get(key)).await
    }

    /// The stored entry when it is live and belongs to the same context
    async fn usable(&self, key: &str, context: Option<&CacheContext>) -> Result<Option<CacheEntry>, DomainError> {
        Ok(self
            .fetch(key)
            .await?
            .filter(|entry| !self.ttl.is_expired(entry) && entry.context_matches(context)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        within(
            "embedding.generate",
            self.port_timeout,
            self.embedding.generate_embedding(text),
        )
        .await
    }

    /// Renew the TTL when due, record the access and persist it
    ///
    /// The stored copy is re-read under the write gate and only updated when
    /// it is still the entry that was read. An entry invalidated or
    /// overwritten in the meantime is left alone.
    async fn serve(&self, entry: CacheEntry) -> CacheEntry {
        let _gate = self.write_gate.lock().await;

        let current = match self.fetch(entry.key()).await {
            Ok(Some(current)) if current.is_same_write(&entry) => current,
            Ok(_) => {
                debug!(key = %entry.key(), "Entry changed while being served, access not recorded");
                return entry;
            }
            Err(e) => {
                warn!(key = %entry.key(), error = %e, "Failed to persist access statistics");
                self.metrics.record_error(e.kind());
                return entry;
            }
        };

        let (current, _) = self.ttl.refresh_if_due(current);
        let current = current.touch(self.ttl.now());

        if let Err(e) = within("storage.set", self.port_timeout, self.storage.set(current.clone())).await {
            warn!(key = %current.key(), error = %e, "Failed to persist access statistics");
            self.metrics.record_error(e.kind());
        }

        current
    }

    /// Lazily drop an entry found expired on the read path
    async fn expire(&self, key: &str) {
        let _gate = self.write_gate.lock().await;

        if let Err(e) = self
            .invalidation
            .invalidate_key(key, TTL_EXPIRATION_REASON, "resolve")
            .await
        {
            warn!(key = %key, error = %e, "Failed to drop expired entry");
            self.metrics.record_error(e.kind());
        }
    }

    /// Index into both indexes, or lexically only without an embedding
    async fn index(&self, key: &str, normalized: &str, embedding: Option<Vec<f32>>) {
        let result = match embedding {
            Some(embedding) => {
                let metadata = IndexMetadata::from([(
                    "normalized_query".to_string(),
                    normalized.to_string(),
                )]);

                within(
                    "index.index",
                    self.port_timeout,
                    self.retriever.index(key, normalized, embedding, metadata),
                )
                .await
            }
            None => {
                within(
                    "index.index_document",
                    self.port_timeout,
                    self.retriever.lexical_index().index_document(key, normalized),
                )
                .await
            }
        };

        if let Err(e) = result {
            warn!(key = %key, error = %e, "Failed to index cache entry");
            self.metrics.record_error(e.kind());
        }
    }
}
