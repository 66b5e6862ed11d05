//! Cache metrics port

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::domain::cache::{EvictionPolicy, HitKind};

/// Hit/miss/eviction accounting for a cache instance
pub trait CacheMetrics: Send + Sync + Debug {
    fn record_hit(&self, kind: HitKind);

    fn record_miss(&self);

    fn record_eviction(&self, policy: EvictionPolicy);

    /// Degraded operation, labelled with the error kind
    fn record_error(&self, kind: &str);

    /// Snapshot of every counter plus the derived `hit_rate`
    fn get_metrics(&self) -> BTreeMap<String, f64>;
}
