//! Event publisher implementations

mod in_memory;

pub use in_memory::{InMemoryEventPublisher, DEFAULT_EVENT_HISTORY};
