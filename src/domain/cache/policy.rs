//! Cache policy configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Victim ordering used when the capacity bound is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently accessed first
    #[default]
    Lru,
    /// Least frequently accessed first
    Lfu,
    /// Oldest insertion first
    Fifo,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Fifo => "fifo",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            "fifo" => Ok(Self::Fifo),
            _ => Err(DomainError::configuration(format!(
                "Unknown eviction policy: {}. Valid policies: lru, lfu, fifo",
                s
            ))),
        }
    }
}

fn default_max_size_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_ttl_seconds() -> Option<u64> {
    Some(3600)
}

fn default_semantic_match_threshold() -> f32 {
    0.85
}

fn default_true() -> bool {
    true
}

/// Rules governing a cache instance
///
/// Immutable once built: the `with_*` methods return a new, re-validated policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(default = "default_max_size_bytes")]
    max_size_bytes: u64,

    /// TTL applied when a store call does not provide one
    #[serde(default = "default_ttl_seconds")]
    default_ttl_seconds: Option<u64>,

    #[serde(default)]
    eviction_policy: EvictionPolicy,

    #[serde(default = "default_semantic_match_threshold")]
    semantic_match_threshold: f32,

    #[serde(default = "default_true")]
    enable_semantic_caching: bool,

    #[serde(default)]
    enable_compression: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            default_ttl_seconds: default_ttl_seconds(),
            eviction_policy: EvictionPolicy::default(),
            semantic_match_threshold: default_semantic_match_threshold(),
            enable_semantic_caching: true,
            enable_compression: false,
        }
    }
}

impl CachePolicy {
    /// Create a policy with the given capacity and defaults for the rest
    pub fn new(max_size_bytes: u64) -> Result<Self, DomainError> {
        Self {
            max_size_bytes,
            ..Default::default()
        }
        .validated()
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Result<Self, DomainError> {
        self.max_size_bytes = max_size_bytes;
        self.validated()
    }

    pub fn with_default_ttl(mut self, ttl_seconds: Option<u64>) -> Result<Self, DomainError> {
        self.default_ttl_seconds = ttl_seconds;
        self.validated()
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_semantic_match_threshold(mut self, threshold: f32) -> Result<Self, DomainError> {
        self.semantic_match_threshold = threshold;
        self.validated()
    }

    pub fn with_semantic_caching(mut self, enabled: bool) -> Self {
        self.enable_semantic_caching = enabled;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Check every invariant, returning the policy unchanged when valid
    pub fn validated(self) -> Result<Self, DomainError> {
        if self.max_size_bytes == 0 {
            return Err(DomainError::validation("max_size_bytes must be greater than 0"));
        }

        if self.default_ttl_seconds == Some(0) {
            return Err(DomainError::validation(
                "default_ttl_seconds must be greater than 0 when set",
            ));
        }

        let threshold = self.semantic_match_threshold;

        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DomainError::validation(format!(
                "semantic_match_threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        Ok(self)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn default_ttl_seconds(&self) -> Option<u64> {
        self.default_ttl_seconds
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction_policy
    }

    pub fn semantic_match_threshold(&self) -> f32 {
        self.semantic_match_threshold
    }

    pub fn enable_semantic_caching(&self) -> bool {
        self.enable_semantic_caching
    }

    pub fn enable_compression(&self) -> bool {
        self.enable_compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = CachePolicy::default();

        assert_eq!(policy.max_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(policy.default_ttl_seconds(), Some(3600));
        assert_eq!(policy.eviction_policy(), EvictionPolicy::Lru);
        assert!((policy.semantic_match_threshold() - 0.85).abs() < f32::EPSILON);
        assert!(policy.enable_semantic_caching());
        assert!(!policy.enable_compression());
    }

    #[test]
    fn test_policy_builder() {
        let policy = CachePolicy::new(1024)
            .unwrap()
            .with_eviction_policy(EvictionPolicy::Lfu)
            .with_semantic_match_threshold(0.9)
            .unwrap()
            .with_default_ttl(None)
            .unwrap()
            .with_semantic_caching(false)
            .with_compression(true);

        assert_eq!(policy.max_size_bytes(), 1024);
        assert_eq!(policy.eviction_policy(), EvictionPolicy::Lfu);
        assert!(policy.default_ttl_seconds().is_none());
        assert!(!policy.enable_semantic_caching());
        assert!(policy.enable_compression());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(CachePolicy::new(0).unwrap_err().is_validation());
    }

    #[test]
    fn test_threshold_bounds() {
        let policy = CachePolicy::default();

        assert!(policy.clone().with_semantic_match_threshold(0.0).is_err());
        assert!(policy.clone().with_semantic_match_threshold(1.01).is_err());
        assert!(policy.clone().with_semantic_match_threshold(f32::NAN).is_err());
        assert!(policy.clone().with_semantic_match_threshold(1.0).is_ok());
        assert!(policy.with_semantic_match_threshold(0.001).is_ok());
    }

    #[test]
    fn test_eviction_policy_parsing() {
        assert_eq!("LRU".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!("lfu".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lfu);
        assert_eq!("Fifo".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Fifo);
        assert!("random".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::Lfu.to_string(), "lfu");
    }

    #[test]
    fn test_policy_deserialize_with_defaults() {
        let policy: CachePolicy =
            serde_json::from_str(r#"{"max_size_bytes": 100, "eviction_policy": "fifo"}"#).unwrap();

        assert_eq!(policy.max_size_bytes(), 100);
        assert_eq!(policy.eviction_policy(), EvictionPolicy::Fifo);
        assert!(policy.enable_semantic_caching());
    }
}
