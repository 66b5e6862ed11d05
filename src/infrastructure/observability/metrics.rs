//! Cache metrics: in-process counters mirrored to the `metrics` facade
//!
//! Counters are always kept locally so `get_metrics` works without an
//! installed recorder; when a recorder is installed the same events are
//! exported as `semantic_cache_*_total` counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use metrics::counter;

use crate::domain::cache::{EvictionPolicy, HitKind};
use crate::domain::metrics::CacheMetrics;

#[derive(Debug, Default)]
pub struct InMemoryCacheMetrics {
    exact_hits: AtomicU64,
    lexical_hits: AtomicU64,
    semantic_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
    evictions_by_policy: Mutex<BTreeMap<&'static str, u64>>,
    errors_by_kind: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryCacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.exact_hits.load(Ordering::Relaxed)
            + self.lexical_hits.load(Ordering::Relaxed)
            + self.semantic_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hits over lookups, 0.0 before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();

        if total == 0 {
            return 0.0;
        }

        hits as f64 / total as f64
    }
}

impl CacheMetrics for InMemoryCacheMetrics {
    fn record_hit(&self, kind: HitKind) {
        let counter = match kind {
            HitKind::Exact => &self.exact_hits,
            HitKind::Lexical => &self.lexical_hits,
            HitKind::Semantic => &self.semantic_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        counter!("semantic_cache_hits_total", "kind" => kind.as_str()).increment(1);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);

        counter!("semantic_cache_misses_total").increment(1);
    }

    fn record_eviction(&self, policy: EvictionPolicy) {
        self.evictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_policy) = self.evictions_by_policy.lock() {
            *by_policy.entry(policy.as_str()).or_insert(0) += 1;
        }

        counter!("semantic_cache_evictions_total", "policy" => policy.as_str()).increment(1);
    }

    fn record_error(&self, kind: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.errors_by_kind.lock() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }

        counter!("semantic_cache_errors_total", "kind" => kind.to_string()).increment(1);
    }

    fn get_metrics(&self) -> BTreeMap<String, f64> {
        let mut snapshot = BTreeMap::new();

        let exact = self.exact_hits.load(Ordering::Relaxed);
        let lexical = self.lexical_hits.load(Ordering::Relaxed);
        let semantic = self.semantic_hits.load(Ordering::Relaxed);

        snapshot.insert("hits".to_string(), (exact + lexical + semantic) as f64);
        snapshot.insert("exact_hits".to_string(), exact as f64);
        snapshot.insert("lexical_hits".to_string(), lexical as f64);
        snapshot.insert("semantic_hits".to_string(), semantic as f64);
        snapshot.insert("misses".to_string(), self.misses() as f64);
        snapshot.insert(
            "evictions".to_string(),
            self.evictions.load(Ordering::Relaxed) as f64,
        );
        snapshot.insert("errors".to_string(), self.errors.load(Ordering::Relaxed) as f64);
        snapshot.insert("hit_rate".to_string(), self.hit_rate());

        if let Ok(by_policy) = self.evictions_by_policy.lock() {
            for (policy, count) in by_policy.iter() {
                snapshot.insert(format!("evictions.{}", policy), *count as f64);
            }
        }

        if let Ok(by_kind) = self.errors_by_kind.lock() {
            for (kind, count) in by_kind.iter() {
                snapshot.insert(format!("errors.{}", kind), *count as f64);
            }
        }

        snapshot
    }
}
