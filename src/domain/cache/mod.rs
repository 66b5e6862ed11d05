//! Cache domain - entries, policy, lookup results and invalidation events

mod entry;
mod event;
mod key;
mod policy;
mod result;

pub use entry::{CacheEntry, EntryMetadata, INTENT_TAG};
pub use event::{CacheInvalidationEvent, InvalidationStrategy};
pub use key::{canonical_json, derive_cache_key, CacheContext};
pub use policy::{CachePolicy, EvictionPolicy};
pub use result::{CacheHit, CacheResult, HitKind, SemanticMatch};

pub(crate) use result::check_unit_range;
