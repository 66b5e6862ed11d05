//! Event publisher port

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::cache::CacheInvalidationEvent;
use crate::domain::DomainError;

/// Callback invoked for every published invalidation event
pub type EventHandler = Arc<dyn Fn(&CacheInvalidationEvent) + Send + Sync>;

/// Fan-out of invalidation events to subscribers
#[async_trait]
pub trait EventPublisher: Send + Sync + Debug {
    async fn publish(&self, event: CacheInvalidationEvent) -> Result<(), DomainError>;

    fn subscribe(&self, handler: EventHandler);
}
