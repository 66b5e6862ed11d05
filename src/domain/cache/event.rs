//! Invalidation events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// When the removal takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidationStrategy {
    Immediate,
    Delayed,
    Conditional,
}

/// Emitted after entries have been removed from the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInvalidationEvent {
    pub event_id: Uuid,
    /// Removed key, or the pattern (`prefix*`, `*`) for aggregate removals
    pub cache_key: String,
    pub reason: String,
    pub triggered_by: String,
    pub timestamp: DateTime<Utc>,
    pub strategy: InvalidationStrategy,
    pub affected_entries: usize,
}

impl CacheInvalidationEvent {
    pub fn immediate(
        cache_key: impl Into<String>,
        reason: impl Into<String>,
        triggered_by: impl Into<String>,
        affected_entries: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            cache_key: cache_key.into(),
            reason: reason.into(),
            triggered_by: triggered_by.into(),
            timestamp,
            strategy: InvalidationStrategy::Immediate,
            affected_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_event() {
        let now = Utc::now();
        let event = CacheInvalidationEvent::immediate("key", "manual", "admin", 1, now);

        assert_eq!(event.cache_key, "key");
        assert_eq!(event.strategy, InvalidationStrategy::Immediate);
        assert_eq!(event.affected_entries, 1);
        assert_eq!(event.timestamp, now);
    }

    #[test]
    fn test_strategy_serialization() {
        let json = serde_json::to_string(&InvalidationStrategy::Immediate).unwrap();
        assert_eq!(json, "\"IMMEDIATE\"");
    }
}
