use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::cache::{CachePolicy, EvictionPolicy};
use crate::domain::DomainError;
use crate::infrastructure::index::Bm25Config;
use crate::infrastructure::retrieval::HybridConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Where entries are kept
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `in_memory` or `file`
    pub backend: String,
    /// Cache directory for the file backend
    pub directory: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "in_memory".to_string(),
            directory: PathBuf::from(".semantic-cache"),
        }
    }
}

/// Which embedding generator backs semantic lookups
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `hashing` (local) or `openai`
    pub provider: String,
    /// Vector length; defaults to the provider's own default
    pub dimension: Option<usize>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            dimension: None,
            model: None,
            api_key: None,
            base_url: None,
        }
    }
}

/// Cache section: policy fields plus adapter and runtime knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size_bytes: u64,
    pub default_ttl_seconds: Option<u64>,
    pub eviction_policy: EvictionPolicy,
    pub semantic_match_threshold: f32,
    pub enable_semantic_caching: bool,
    pub enable_compression: bool,
    pub intent_tokens: usize,
    /// Upper bound for every storage, embedding and index call
    pub port_timeout_ms: u64,
    /// Background expiry sweep period; 0 disables the sweep
    pub purge_interval_secs: u64,
    pub storage: StorageSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: HybridConfig,
    pub bm25: Bm25Config,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let policy = CachePolicy::default();

        Self {
            max_size_bytes: policy.max_size_bytes(),
            default_ttl_seconds: policy.default_ttl_seconds(),
            eviction_policy: policy.eviction_policy(),
            semantic_match_threshold: policy.semantic_match_threshold(),
            enable_semantic_caching: policy.enable_semantic_caching(),
            enable_compression: policy.enable_compression(),
            intent_tokens: crate::domain::normalization::DEFAULT_INTENT_TOKENS,
            port_timeout_ms: 2_000,
            purge_interval_secs: 60,
            storage: StorageSettings::default(),
            embedding: EmbeddingSettings::default(),
            retrieval: HybridConfig::default(),
            bm25: Bm25Config::default(),
        }
    }
}

impl TryFrom<&CacheSettings> for CachePolicy {
    type Error = DomainError;

    fn try_from(settings: &CacheSettings) -> Result<Self, Self::Error> {
        CachePolicy::new(settings.max_size_bytes)?
            .with_default_ttl(settings.default_ttl_seconds)?
            .with_semantic_match_threshold(settings.semantic_match_threshold)
            .map(|policy| {
                policy
                    .with_eviction_policy(settings.eviction_policy)
                    .with_semantic_caching(settings.enable_semantic_caching)
                    .with_compression(settings.enable_compression)
            })
    }
}

impl AppConfig {
    /// Layered load: `config/default`, `config/local`, then `SEMCACHE__*`
    /// environment variables (e.g. `SEMCACHE__CACHE__MAX_SIZE_BYTES`)
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from(directory: &str) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", directory)).required(false))
            .add_source(config::File::with_name(&format!("{}/local", directory)).required(false))
            .add_source(
                config::Environment::with_prefix("SEMCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
