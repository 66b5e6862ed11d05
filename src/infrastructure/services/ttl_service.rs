//! Expiry and renewal windows

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::cache::CacheEntry;
use crate::domain::clock::Clock;
use crate::domain::DomainError;

/// Share of the TTL window that must elapse before a read renews it
pub const REFRESH_FRACTION: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct TtlService {
    clock: Arc<dyn Clock>,
}

impl TtlService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// `now + ttl`, or none without a TTL
    pub fn expiration_time(
        &self,
        ttl_seconds: Option<u64>,
    ) -> Result<Option<DateTime<Utc>>, DomainError> {
        let Some(ttl) = ttl_seconds else {
            return Ok(None);
        };

        i64::try_from(ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| self.clock.now().checked_add_signed(window))
            .map(Some)
            .ok_or_else(|| DomainError::validation(format!("TTL of {}s is out of range", ttl)))
    }

    /// True once more than 90% of the current TTL window has elapsed
    ///
    /// The window starts at `expires_at - ttl`, so a renewed entry is not
    /// renewed again until most of its new window has passed.
    pub fn should_refresh_ttl(&self, entry: &CacheEntry) -> bool {
        let (Some(ttl), Some(expires_at)) = (entry.ttl_seconds(), entry.expires_at()) else {
            return false;
        };

        let window_ms = ttl as f64 * 1000.0;
        let remaining_ms = (expires_at - self.clock.now()).num_milliseconds() as f64;
        let elapsed_ms = window_ms - remaining_ms;

        elapsed_ms > window_ms * REFRESH_FRACTION
    }

    pub fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.is_expired_at(self.clock.now())
    }

    /// Renew the window when due; returns the entry and whether it changed
    pub fn refresh_if_due(&self, entry: CacheEntry) -> (CacheEntry, bool) {
        if self.should_refresh_ttl(&entry) {
            (entry.refresh_ttl(self.clock.now()), true)
        } else {
            (entry, false)
        }
    }
}
