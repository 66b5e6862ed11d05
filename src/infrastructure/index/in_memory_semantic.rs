//! In-memory dense index using linear search

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::cache::SemanticMatch;
use crate::domain::embedding::clamped_cosine_similarity;
use crate::domain::index::{IndexMetadata, SemanticIndex};
use crate::domain::DomainError;

#[derive(Debug)]
struct IndexedEmbedding {
    vector: Vec<f32>,
    metadata: IndexMetadata,
}

#[derive(Debug, Default)]
struct Inner {
    embeddings: HashMap<String, IndexedEmbedding>,
    dimension: Option<usize>,
}

/// Dense index scanning every embedding on each search
///
/// Suitable for development and small caches. The dimension is fixed up
/// front or by the first indexed vector; any other length is rejected.
/// Reported confidence equals the clamped cosine similarity.
#[derive(Debug, Default)]
pub struct InMemorySemanticIndex {
    inner: RwLock<Inner>,
}

impl InMemorySemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index accepting only vectors of the given length
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                embeddings: HashMap::new(),
                dimension: Some(dimension),
            }),
        }
    }

    /// Metadata stored with the embedding of a key
    pub fn metadata(&self, key: &str) -> Option<IndexMetadata> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.embeddings.get(key).map(|e| e.metadata.clone()))
    }

    fn check_dimension(expected: Option<usize>, actual: usize) -> Result<(), DomainError> {
        match expected {
            Some(expected) if expected != actual => Err(DomainError::index(format!(
                "Embedding dimension mismatch: index holds {}-dimensional vectors, got {}",
                expected, actual
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SemanticIndex for InMemorySemanticIndex {
    async fn index_embedding(
        &self,
        key: &str,
        vector: Vec<f32>,
        metadata: IndexMetadata,
    ) -> Result<(), DomainError> {
        if vector.is_empty() {
            return Err(DomainError::index(format!("Empty embedding for '{}'", key)));
        }

        let mut inner = self.inner.write().map_err(|e| {
            DomainError::index(format!("Failed to acquire write lock: {}", e))
        })?;

        Self::check_dimension(inner.dimension, vector.len())?;
        inner.dimension = Some(vector.len());
        inner
            .embeddings
            .insert(key.to_string(), IndexedEmbedding { vector, metadata });

        Ok(())
    }

    async fn find_similar(
        &self,
        vector: &[f32],
        threshold: f32,
    ) -> Result<Vec<SemanticMatch>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::index(format!("Failed to acquire read lock: {}", e))
        })?;

        Self::check_dimension(inner.dimension, vector.len())?;

        let mut results = Vec::new();

        for (key, indexed) in &inner.embeddings {
            let similarity = clamped_cosine_similarity(vector, &indexed.vector);

            if similarity >= threshold {
                results.push(SemanticMatch::new(key.clone(), similarity, similarity)?);
            }
        }

        // Sort by similarity descending, key ascending for ties
        results.sort_by(|a, b| {
            b.similarity_score()
                .partial_cmp(&a.similarity_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.matched_entry_key().cmp(b.matched_entry_key()))
        });

        Ok(results)
    }

    async fn remove_embedding(&self, key: &str) -> Result<bool, DomainError> {
        let mut inner = self.inner.write().map_err(|e| {
            DomainError::index(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(inner.embeddings.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.write().map_err(|e| {
            DomainError::index(format!("Failed to acquire write lock: {}", e))
        })?;

        inner.embeddings.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::index(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.embeddings.len())
    }
}
