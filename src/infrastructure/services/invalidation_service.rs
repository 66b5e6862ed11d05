//! Explicit, prefix and expiry-driven removal

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::deadline::{within, DEFAULT_PORT_TIMEOUT};
use crate::domain::cache::CacheInvalidationEvent;
use crate::domain::clock::Clock;
use crate::domain::events::EventPublisher;
use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;
use crate::infrastructure::retrieval::HybridRetriever;

pub const TTL_EXPIRATION_REASON: &str = "ttl_expiration";
pub const EVICTION_REASON: &str = "eviction";
pub const SYSTEM_TRIGGER: &str = "system";

/// Removes entries from storage and both indexes, then publishes one event
/// per operation
///
/// Callers that need the capacity invariant serialize these calls with the
/// store path; this service does no locking of its own.
#[derive(Debug, Clone)]
pub struct InvalidationService {
    storage: Arc<dyn CacheStorage>,
    retriever: Arc<HybridRetriever>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    port_timeout: Duration,
}

impl InvalidationService {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        retriever: Arc<HybridRetriever>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            retriever,
            publisher,
            clock,
            port_timeout: DEFAULT_PORT_TIMEOUT,
        }
    }

    pub fn with_port_timeout(mut self, port_timeout: Duration) -> Self {
        self.port_timeout = port_timeout;
        self
    }

    /// Remove one key; `Ok(false)` when nothing was stored under it
    pub async fn invalidate_key(
        &self,
        key: &str,
        reason: &str,
        triggered_by: &str,
    ) -> Result<bool, DomainError> {
        let deleted = self.remove(key).await?;

        if deleted {
            self.publish(CacheInvalidationEvent::immediate(
                key,
                reason,
                triggered_by,
                1,
                self.clock.now(),
            ))
            .await;
        }

        Ok(deleted)
    }

    /// Remove every key starting with `prefix`, returns how many went
    pub async fn invalidate_by_prefix(
        &self,
        prefix: &str,
        reason: &str,
        triggered_by: &str,
    ) -> Result<usize, DomainError> {
        let keys = self.all_keys().await?;
        let mut removed = 0;

        for key in keys.iter().filter(|k| k.starts_with(prefix)) {
            match self.remove(key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to invalidate key, continuing"),
            }
        }

        if removed > 0 {
            self.publish(CacheInvalidationEvent::immediate(
                format!("{}*", prefix),
                reason,
                triggered_by,
                removed,
                self.clock.now(),
            ))
            .await;
        }

        Ok(removed)
    }

    /// Sweep every entry with `now >= expires_at`
    pub async fn purge_expired(&self) -> Result<usize, DomainError> {
        let keys = self.all_keys().await?;
        let now = self.clock.now();
        let mut purged = 0;

        for key in keys {
            let entry = match within("storage.get", self.port_timeout, self.storage.get(&key)).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read entry during purge, continuing");
                    continue;
                }
            };

            if !entry.is_expired_at(now) {
                continue;
            }

            match self.remove(&key).await {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to purge expired entry, continuing"),
            }
        }

        if purged > 0 {
            self.publish(CacheInvalidationEvent::immediate(
                "*",
                TTL_EXPIRATION_REASON,
                SYSTEM_TRIGGER,
                purged,
                now,
            ))
            .await;
        }

        debug!(purged, "Expired entry sweep complete");

        Ok(purged)
    }

    async fn all_keys(&self) -> Result<Vec<String>, DomainError> {
        within("storage.all_keys", self.port_timeout, self.storage.all_keys()).await
    }

    /// Storage failures propagate; index cleanup failures are only logged
    async fn remove(&self, key: &str) -> Result<bool, DomainError> {
        let deleted = within("storage.delete", self.port_timeout, self.storage.delete(key)).await?;

        if let Err(e) = within("index.remove", self.port_timeout, self.retriever.remove(key)).await {
            warn!(key = %key, error = %e, "Failed to remove key from indexes");
        }

        Ok(deleted)
    }

    async fn publish(&self, event: CacheInvalidationEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!(error = %e, "Failed to publish invalidation event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheEntry;
    use crate::domain::clock::ManualClock;
    use crate::domain::index::{LexicalIndex, MockSemanticIndex};
    use crate::domain::storage::MockCacheStorage;
    use crate::infrastructure::events::InMemoryEventPublisher;
    use crate::infrastructure::index::Bm25Index;
    use crate::infrastructure::retrieval::HybridConfig;

    struct Fixture {
        storage: Arc<MockCacheStorage>,
        semantic: Arc<MockSemanticIndex>,
        lexical: Arc<Bm25Index>,
        publisher: Arc<InMemoryEventPublisher>,
        clock: Arc<ManualClock>,
        service: InvalidationService,
    }

    fn fixture(storage: MockCacheStorage) -> Fixture {
        let storage = Arc::new(storage);
        let semantic = Arc::new(MockSemanticIndex::new());
        let lexical = Arc::new(Bm25Index::default());
        let publisher = Arc::new(InMemoryEventPublisher::default());
        let clock = Arc::new(ManualClock::starting_now());
        let retriever = Arc::new(HybridRetriever::new(
            semantic.clone(),
            lexical.clone(),
            HybridConfig::default(),
        ));

        let service = InvalidationService::new(
            storage.clone(),
            retriever,
            publisher.clone(),
            clock.clone(),
        );

        Fixture {
            storage,
            semantic,
            lexical,
            publisher,
            clock,
            service,
        }
    }

    fn entry(key: &str, clock: &ManualClock) -> CacheEntry {
        CacheEntry::new(key, b"value".to_vec(), clock.now()).unwrap()
    }

    #[tokio::test]
    async fn test_invalidate_key_is_idempotent() {
        let clock = ManualClock::starting_now();
        let f = fixture(MockCacheStorage::new().with_entry(entry("user:1", &clock)));
        f.lexical.index_document("user:1", "hello world").await.unwrap();

        assert!(f.service.invalidate_key("user:1", "manual", "admin").await.unwrap());
        assert!(!f.service.invalidate_key("user:1", "manual", "admin").await.unwrap());

        assert!(f.storage.snapshot("user:1").is_none());
        assert_eq!(f.lexical.len().await.unwrap(), 0);
        assert!(f.semantic.removed().contains(&"user:1".to_string()));

        let events = f.publisher.recent_events(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cache_key, "user:1");
        assert_eq!(events[0].affected_entries, 1);
        assert_eq!(events[0].triggered_by, "admin");
    }

    #[tokio::test]
    async fn test_invalidate_key_storage_failure_propagates() {
        let f = fixture(MockCacheStorage::new().with_error("disk unavailable"));

        let error = f.service.invalidate_key("k", "manual", "admin").await.unwrap_err();

        assert!(error.is_storage());
        assert!(f.publisher.recent_events(10).is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_by_prefix() {
        let clock = ManualClock::starting_now();
        let f = fixture(
            MockCacheStorage::new()
                .with_entry(entry("user:1", &clock))
                .with_entry(entry("user:2", &clock))
                .with_entry(entry("order:1", &clock)),
        );

        let removed = f.service.invalidate_by_prefix("user:", "manual", "admin").await.unwrap();

        assert_eq!(removed, 2);
        assert!(f.storage.snapshot("order:1").is_some());

        let events = f.publisher.recent_events(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cache_key, "user:*");
        assert_eq!(events[0].affected_entries, 2);
    }

    #[tokio::test]
    async fn test_prefix_sweep_continues_past_failures() {
        let clock = ManualClock::starting_now();
        let f = fixture(
            MockCacheStorage::new()
                .with_entry(entry("user:1", &clock))
                .with_entry(entry("user:2", &clock))
                .with_failing_delete("user:1"),
        );

        let removed = f.service.invalidate_by_prefix("user:", "manual", "admin").await.unwrap();

        assert_eq!(removed, 1);
        assert!(f.storage.snapshot("user:1").is_some());
        assert!(f.storage.snapshot("user:2").is_none());
    }

    #[tokio::test]
    async fn test_empty_prefix_sweep_emits_nothing() {
        let f = fixture(MockCacheStorage::new());

        let removed = f.service.invalidate_by_prefix("none:", "manual", "admin").await.unwrap();

        assert_eq!(removed, 0);
        assert!(f.publisher.recent_events(10).is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = ManualClock::starting_now();
        let f = fixture(
            MockCacheStorage::new()
                .with_entry(entry("short", &clock).with_ttl(10).unwrap())
                .with_entry(entry("long", &clock).with_ttl(100).unwrap())
                .with_entry(entry("forever", &clock)),
        );
        f.clock.set(clock.now());

        f.clock.advance_secs(10);
        let purged = f.service.purge_expired().await.unwrap();

        assert_eq!(purged, 1);
        assert!(f.storage.snapshot("short").is_none());
        assert!(f.storage.snapshot("long").is_some());
        assert!(f.storage.snapshot("forever").is_some());

        let events = f.publisher.recent_events(10);
        assert_eq!(events[0].cache_key, "*");
        assert_eq!(events[0].reason, TTL_EXPIRATION_REASON);
        assert_eq!(events[0].triggered_by, SYSTEM_TRIGGER);
    }

    #[tokio::test]
    async fn test_subscribers_see_events() {
        let clock = ManualClock::starting_now();
        let f = fixture(MockCacheStorage::new().with_entry(entry("k", &clock)));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();

        f.publisher.subscribe(Arc::new(move |event: &CacheInvalidationEvent| {
            sink.lock().unwrap().push(event.cache_key.clone());
        }));

        f.service.invalidate_key("k", "manual", "admin").await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["k".to_string()]);
    }
}
