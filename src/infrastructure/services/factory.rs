//! Composition root: builds a cache from configuration

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use super::cache_service::{SemanticCacheDeps, SemanticCacheService};
use crate::config::{CacheSettings, EmbeddingSettings, StorageSettings};
use crate::domain::cache::CachePolicy;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::embedding::EmbeddingGenerator;
use crate::domain::normalization::QueryNormalizer;
use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;
use crate::infrastructure::embedding::{
    HashingEmbeddingGenerator, HttpClient, OpenAiEmbeddingGenerator, DEFAULT_EMBEDDING_MODEL,
};
use crate::infrastructure::events::InMemoryEventPublisher;
use crate::infrastructure::index::{default_synonyms, Bm25Index, InMemorySemanticIndex, SynonymTable};
use crate::infrastructure::observability::InMemoryCacheMetrics;
use crate::infrastructure::retrieval::HybridRetriever;
use crate::infrastructure::storage::{StorageConfig, StorageFactory, StorageType};

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderType {
    Hashing,
    OpenAi,
}

impl EmbeddingProviderType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hashing" | "local" => Some(Self::Hashing),
            "openai" | "open_ai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SemanticCacheFactory;

impl SemanticCacheFactory {
    /// Build a cache on the wall clock
    pub async fn create(settings: &CacheSettings) -> Result<SemanticCacheService, DomainError> {
        Self::create_with_clock(settings, Arc::new(SystemClock)).await
    }

    /// Build a shared cache and start the expiry sweep when
    /// `purge_interval_secs` is non-zero; abort the handle to stop it
    pub async fn start(
        settings: &CacheSettings,
    ) -> Result<(Arc<SemanticCacheService>, Option<JoinHandle<()>>), DomainError> {
        let cache = Arc::new(Self::create(settings).await?);

        let purge_task = (settings.purge_interval_secs > 0).then(|| {
            cache.spawn_purge_task(Duration::from_secs(settings.purge_interval_secs))
        });

        Ok((cache, purge_task))
    }

    pub async fn create_with_clock(
        settings: &CacheSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<SemanticCacheService, DomainError> {
        let policy = CachePolicy::try_from(settings)?;
        let port_timeout = Duration::from_millis(settings.port_timeout_ms.max(1));

        let storage = Self::create_storage(&settings.storage).await?;
        let embedding = Self::create_embedding(&settings.embedding, port_timeout)?;

        let synonyms = if settings.bm25.expand_synonyms {
            default_synonyms()
        } else {
            SynonymTable::empty()
        };
        let retriever = Arc::new(HybridRetriever::new(
            Arc::new(InMemorySemanticIndex::with_dimension(embedding.dimension())),
            Arc::new(Bm25Index::new(settings.bm25.clone().validated()?, synonyms)),
            settings.retrieval.clone().validated()?,
        ));

        info!(
            storage = %settings.storage.backend,
            embedding = embedding.name(),
            dimension = embedding.dimension(),
            eviction_policy = %policy.eviction_policy(),
            max_size_bytes = policy.max_size_bytes(),
            "Semantic cache initialized"
        );

        let deps = SemanticCacheDeps {
            storage,
            embedding,
            retriever,
            metrics: Arc::new(InMemoryCacheMetrics::new()),
            publisher: Arc::new(InMemoryEventPublisher::default()),
            clock,
        };

        let cache = SemanticCacheService::new(deps, policy)
            .with_port_timeout(port_timeout)
            .with_normalizer(QueryNormalizer::new().with_intent_tokens(settings.intent_tokens));

        let persistent = StorageType::from_str(&settings.storage.backend) == Some(StorageType::File);

        if persistent && cache.policy().enable_semantic_caching() {
            cache.rebuild_indexes().await?;
        }

        Ok(cache)
    }

    async fn create_storage(settings: &StorageSettings) -> Result<Arc<dyn CacheStorage>, DomainError> {
        let storage_type = StorageType::from_str(&settings.backend).ok_or_else(|| {
            DomainError::configuration(format!("Unknown storage backend '{}'", settings.backend))
        })?;

        let config = match storage_type {
            StorageType::InMemory => StorageConfig::in_memory(),
            StorageType::File => StorageConfig::file(settings.directory.clone()),
        };

        StorageFactory::create(&config).await
    }

    fn create_embedding(
        settings: &EmbeddingSettings,
        timeout: Duration,
    ) -> Result<Arc<dyn EmbeddingGenerator>, DomainError> {
        let provider = EmbeddingProviderType::from_str(&settings.provider).ok_or_else(|| {
            DomainError::configuration(format!("Unknown embedding provider '{}'", settings.provider))
        })?;

        match provider {
            EmbeddingProviderType::Hashing => {
                let generator = match settings.dimension {
                    Some(dimension) => HashingEmbeddingGenerator::new(dimension)?,
                    None => HashingEmbeddingGenerator::default(),
                };
                Ok(Arc::new(generator))
            }
            EmbeddingProviderType::OpenAi => {
                let api_key = settings.api_key.as_deref().ok_or_else(|| {
                    DomainError::configuration("The openai embedding provider requires an api_key")
                })?;
                let client = HttpClient::with_timeout(timeout)?;

                let generator = match settings.base_url.as_deref() {
                    Some(base_url) => OpenAiEmbeddingGenerator::with_base_url(client, api_key, base_url),
                    None => OpenAiEmbeddingGenerator::new(client, api_key),
                };
                let model = settings
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

                Ok(Arc::new(generator.with_model(model, settings.dimension)))
            }
        }
    }
}
