//! Capacity enforcement
//!
//! When `current + incoming` exceeds the policy bound, entries are deleted in
//! policy order until the overflow is covered. Ties in the ordering key are
//! broken by cache key so victim selection is deterministic.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::deadline::{within, DEFAULT_PORT_TIMEOUT};
use crate::domain::cache::{CacheEntry, EvictionPolicy};
use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;

/// What an eviction pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub evicted_keys: Vec<String>,
    pub freed_bytes: u64,
}

/// Sort candidates into eviction order, first victim first
pub fn order_candidates(entries: &mut [CacheEntry], policy: EvictionPolicy) {
    entries.sort_by(|a, b| {
        let primary = match policy {
            EvictionPolicy::Lru => a
                .last_accessed_or_created()
                .cmp(&b.last_accessed_or_created()),
            EvictionPolicy::Lfu => a.access_count().cmp(&b.access_count()),
            EvictionPolicy::Fifo => a.created_at().cmp(&b.created_at()),
        };

        match primary {
            Ordering::Equal => a.key().cmp(b.key()),
            other => other,
        }
    });
}

#[derive(Debug, Clone)]
pub struct EvictionService {
    storage: Arc<dyn CacheStorage>,
    policy: EvictionPolicy,
    max_size_bytes: u64,
    port_timeout: Duration,
}

impl EvictionService {
    pub fn new(storage: Arc<dyn CacheStorage>, policy: EvictionPolicy, max_size_bytes: u64) -> Self {
        Self {
            storage,
            policy,
            max_size_bytes,
            port_timeout: DEFAULT_PORT_TIMEOUT,
        }
    }

    pub fn with_port_timeout(mut self, port_timeout: Duration) -> Self {
        self.port_timeout = port_timeout;
        self
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Bytes that must be freed to admit `incoming` bytes
    pub fn space_needed(&self, current_size_bytes: u64, incoming_size_bytes: u64) -> u64 {
        current_size_bytes
            .saturating_add(incoming_size_bytes)
            .saturating_sub(self.max_size_bytes)
    }

    /// Delete victims until `current - freed + incoming <= max`
    ///
    /// `protected_key` is never evicted (the key being overwritten). Victims
    /// whose deletion fails are skipped with a warning and the next one is
    /// tried. If every candidate is gone the outcome simply frees less than
    /// needed; the caller decides what to do with the write.
    pub async fn evict_if_necessary(
        &self,
        current_size_bytes: u64,
        incoming_size_bytes: u64,
        protected_key: Option<&str>,
    ) -> Result<EvictionOutcome, DomainError> {
        let space_needed = self.space_needed(current_size_bytes, incoming_size_bytes);

        if space_needed == 0 {
            return Ok(EvictionOutcome::default());
        }

        let mut candidates = self.load_candidates(protected_key).await?;
        order_candidates(&mut candidates, self.policy);

        let mut outcome = EvictionOutcome::default();

        for candidate in candidates {
            if outcome.freed_bytes >= space_needed {
                break;
            }

            let deleted = within(
                "storage.delete",
                self.port_timeout,
                self.storage.delete(candidate.key()),
            )
            .await;

            match deleted {
                Ok(true) => {
                    outcome.freed_bytes += candidate.size_bytes();
                    outcome.evicted_keys.push(candidate.key().to_string());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %candidate.key(), error = %e, "Failed to evict entry, trying next");
                }
            }
        }

        debug!(
            policy = %self.policy,
            space_needed,
            freed_bytes = outcome.freed_bytes,
            evicted = outcome.evicted_keys.len(),
            "Eviction pass complete"
        );

        Ok(outcome)
    }

    async fn load_candidates(&self, protected_key: Option<&str>) -> Result<Vec<CacheEntry>, DomainError> {
        let keys = within("storage.all_keys", self.port_timeout, self.storage.all_keys()).await?;
        let mut candidates = Vec::with_capacity(keys.len());

        for key in keys {
            if Some(key.as_str()) == protected_key {
                continue;
            }

            match within("storage.get", self.port_timeout, self.storage.get(&key)).await {
                Ok(Some(entry)) => candidates.push(entry),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable eviction candidate"),
            }
        }

        Ok(candidates)
    }
}
