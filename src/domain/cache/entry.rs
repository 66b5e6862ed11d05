//! Cache entry value object

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::key::CacheContext;
use crate::domain::DomainError;

/// Metadata tag holding the intent bucket of the stored query
pub const INTENT_TAG: &str = "intent";

/// Access statistics and descriptive data attached to an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryMetadata {
    access_count: u64,
    last_accessed_at: Option<DateTime<Utc>>,
    normalized_query: Option<String>,
    tags: BTreeMap<String, String>,
}

impl EntryMetadata {
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn last_accessed_at(&self) -> Option<DateTime<Utc>> {
        self.last_accessed_at
    }

    pub fn normalized_query(&self) -> Option<&str> {
        self.normalized_query.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// An immutable cached item
///
/// All "mutations" (`touch`, `refresh_ttl`, the `with_*` builders) consume the
/// entry and return a new one. Construction enforces the invariants: non-empty
/// key and value, and `expires_at` strictly after `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    key: String,
    #[serde(skip)]
    value: Vec<u8>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    ttl_seconds: Option<u64>,
    #[serde(skip)]
    embedding: Option<Vec<f32>>,
    metadata: EntryMetadata,
    context: Option<CacheContext>,
}

impl CacheEntry {
    /// Create a new entry with no expiry
    pub fn new(
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let key = key.into();
        let value = value.into();

        if key.is_empty() {
            return Err(DomainError::validation("Cache entry key must not be empty"));
        }

        if value.is_empty() {
            return Err(DomainError::validation(format!(
                "Cache entry value for '{}' must not be empty",
                key
            )));
        }

        Ok(Self {
            key,
            value,
            created_at,
            expires_at: None,
            ttl_seconds: None,
            embedding: None,
            metadata: EntryMetadata::default(),
            context: None,
        })
    }

    /// Set a TTL; the expiry becomes `created_at + ttl`
    pub fn with_ttl(self, ttl_seconds: u64) -> Result<Self, DomainError> {
        let expires_at = self
            .created_at
            .checked_add_signed(seconds(ttl_seconds)?)
            .ok_or_else(|| DomainError::validation(format!("TTL of {}s is out of range", ttl_seconds)))?;
        let mut entry = self.with_expires_at(expires_at)?;
        entry.ttl_seconds = Some(ttl_seconds);
        Ok(entry)
    }

    /// Set an explicit expiry instant
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Result<Self, DomainError> {
        if expires_at <= self.created_at {
            return Err(DomainError::validation(format!(
                "Expiry {} of '{}' must be after creation time {}",
                expires_at, self.key, self.created_at
            )));
        }

        self.expires_at = Some(expires_at);
        Ok(self)
    }

    /// Set the TTL window length together with an already renewed expiry
    pub fn with_renewed_expiry(
        self,
        ttl_seconds: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut entry = self.with_expires_at(expires_at)?;
        entry.ttl_seconds = Some(ttl_seconds);
        Ok(entry)
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_normalized_query(mut self, normalized_query: impl Into<String>) -> Self {
        self.metadata.normalized_query = Some(normalized_query.into());
        self
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.tags.insert(name.into(), value.into());
        self
    }

    pub fn with_context(mut self, context: CacheContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Restore access statistics, used by adapters rebuilding persisted entries
    pub fn with_access_stats(
        mut self,
        access_count: u64,
        last_accessed_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.metadata.access_count = access_count;
        self.metadata.last_accessed_at = last_accessed_at;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn ttl_seconds(&self) -> Option<u64> {
        self.ttl_seconds
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn context(&self) -> Option<&CacheContext> {
        self.context.as_ref()
    }

    /// Size accounted against the capacity bound
    pub fn size_bytes(&self) -> u64 {
        self.value.len() as u64
    }

    /// Access count, shortcut for eviction ordering
    pub fn access_count(&self) -> u64 {
        self.metadata.access_count
    }

    /// Last access time, falling back to creation time for never-read entries
    pub fn last_accessed_or_created(&self) -> DateTime<Utc> {
        self.metadata.last_accessed_at.unwrap_or(self.created_at)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Whether the stored context equals the given one (absent == empty)
    pub fn context_matches(&self, context: Option<&CacheContext>) -> bool {
        let own = self.context.as_ref().filter(|c| !c.is_empty());
        let other = context.filter(|c| !c.is_empty());
        own == other
    }

    /// Whether `other` holds the same stored write as `self`, ignoring
    /// access statistics and TTL renewals
    pub fn is_same_write(&self, other: &CacheEntry) -> bool {
        self.key == other.key && self.created_at == other.created_at && self.value == other.value
    }

    /// Record a read: bumps the access count and the last access time
    pub fn touch(mut self, now: DateTime<Utc>) -> Self {
        self.metadata.access_count += 1;
        self.metadata.last_accessed_at = Some(now);
        self
    }

    /// Start a new TTL window at `now`; entries without a TTL are returned unchanged
    pub fn refresh_ttl(mut self, now: DateTime<Utc>) -> Self {
        if let Some(ttl) = self.ttl_seconds {
            let renewed = seconds(ttl)
                .ok()
                .and_then(|window| now.checked_add_signed(window));

            if let Some(expires_at) = renewed.filter(|at| *at > self.created_at) {
                self.expires_at = Some(expires_at);
            }
        }

        self
    }
}

fn seconds(ttl_seconds: u64) -> Result<Duration, DomainError> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| DomainError::validation(format!("TTL of {}s is out of range", ttl_seconds)))
}
