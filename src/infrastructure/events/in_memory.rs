//! In-process invalidation event publisher

use std::collections::VecDeque;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::info;

use crate::domain::cache::CacheInvalidationEvent;
use crate::domain::events::{EventHandler, EventPublisher};
use crate::domain::DomainError;

pub const DEFAULT_EVENT_HISTORY: usize = 256;

/// Calls every subscribed handler synchronously and keeps a bounded history
pub struct InMemoryEventPublisher {
    handlers: RwLock<Vec<EventHandler>>,
    history: RwLock<VecDeque<CacheInvalidationEvent>>,
    capacity: usize,
}

impl fmt::Debug for InMemoryEventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventPublisher")
            .field(
                "handlers",
                &self.handlers.read().map(|h| h.len()).unwrap_or_default(),
            )
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for InMemoryEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_HISTORY)
    }
}

impl InMemoryEventPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_HISTORY))),
            capacity,
        }
    }

    /// The `n` most recent events, oldest first
    pub fn recent_events(&self, n: usize) -> Vec<CacheInvalidationEvent> {
        self.history
            .read()
            .map(|history| {
                let skip = history.len().saturating_sub(n);
                history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: CacheInvalidationEvent) -> Result<(), DomainError> {
        info!(
            event_id = %event.event_id,
            cache_key = %event.cache_key,
            reason = %event.reason,
            triggered_by = %event.triggered_by,
            affected_entries = event.affected_entries,
            "Cache invalidation"
        );

        let handlers = self
            .handlers
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?
            .clone();

        for handler in handlers {
            handler(&event);
        }

        if self.capacity > 0 {
            let mut history = self.history.write().map_err(|e| {
                DomainError::internal(format!("Failed to acquire write lock: {}", e))
            })?;

            if history.len() == self.capacity {
                history.pop_front();
            }

            history.push_back(event);
        }

        Ok(())
    }

    fn subscribe(&self, handler: EventHandler) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.push(handler);
        }
    }
}
