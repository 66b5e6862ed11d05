//! Hybrid retrieval fusing dense and lexical rankings
//!
//! `combined = alpha * dense + (1 - alpha) * sparse / max_sparse`, where the
//! lexical scores are normalized by the best lexical score of the query.
//! A document found by only one of the two indexes contributes only that
//! term. Confidence is fused the same way from the dense confidence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::index::{IndexMetadata, LexicalIndex, SemanticIndex};
use crate::domain::DomainError;

pub const DEFAULT_ALPHA: f32 = 0.5;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SPARSE_CANDIDATES: usize = 20;

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HybridConfig {
    /// Weight of the dense score (0.0 - 1.0); lexical gets `1 - alpha`
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Maximum candidates returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum dense similarity requested from the dense index
    #[serde(default)]
    pub dense_floor: f32,
    /// How many lexical results are fused
    #[serde(default = "default_sparse_candidates")]
    pub sparse_candidates: usize,
}

fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_sparse_candidates() -> usize {
    DEFAULT_SPARSE_CANDIDATES
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
            dense_floor: 0.0,
            sparse_candidates: DEFAULT_SPARSE_CANDIDATES,
        }
    }
}

impl HybridConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_dense_floor(mut self, dense_floor: f32) -> Self {
        self.dense_floor = dense_floor;
        self
    }

    pub fn validated(self) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(DomainError::configuration(format!(
                "Hybrid alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }

        if !(0.0..=1.0).contains(&self.dense_floor) {
            return Err(DomainError::configuration(format!(
                "Dense floor must be within [0, 1], got {}",
                self.dense_floor
            )));
        }

        if self.top_k == 0 {
            return Err(DomainError::configuration("Hybrid top_k must be at least 1"));
        }

        Ok(self)
    }
}

/// A fused retrieval candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridCandidate {
    pub key: String,
    pub combined_score: f32,
    pub confidence: f32,
    pub dense_score: Option<f32>,
    /// Lexical score after normalization by the best lexical score
    pub sparse_score: Option<f32>,
}

#[derive(Debug, Default)]
struct Scores {
    dense: Option<(f32, f32)>,
    sparse: Option<f32>,
}

/// Owns the dense and lexical indexes and fuses their rankings
#[derive(Debug, Clone)]
pub struct HybridRetriever {
    semantic_index: Arc<dyn SemanticIndex>,
    lexical_index: Arc<dyn LexicalIndex>,
    config: HybridConfig,
}

impl HybridRetriever {
    pub fn new(
        semantic_index: Arc<dyn SemanticIndex>,
        lexical_index: Arc<dyn LexicalIndex>,
        config: HybridConfig,
    ) -> Self {
        Self {
            semantic_index,
            lexical_index,
            config,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn lexical_index(&self) -> &Arc<dyn LexicalIndex> {
        &self.lexical_index
    }

    /// Add a document to both indexes
    ///
    /// Both writes are attempted even when the first one fails; the first
    /// error is returned.
    pub async fn index(
        &self,
        key: &str,
        text: &str,
        embedding: Vec<f32>,
        metadata: IndexMetadata,
    ) -> Result<(), DomainError> {
        let dense = self
            .semantic_index
            .index_embedding(key, embedding, metadata)
            .await;
        let sparse = self.lexical_index.index_document(key, text).await;

        dense.and(sparse)
    }

    /// Remove a key from both indexes, returns true if either held it
    ///
    /// Both removals are attempted even when the first one fails.
    pub async fn remove(&self, key: &str) -> Result<bool, DomainError> {
        let dense = self.semantic_index.remove_embedding(key).await;
        let sparse = self.lexical_index.remove_document(key).await;

        Ok(dense? | sparse?)
    }

    pub async fn clear(&self) -> Result<(), DomainError> {
        let dense = self.semantic_index.clear().await;
        let sparse = self.lexical_index.clear().await;

        dense.and(sparse)
    }

    /// Top-k candidates whose combined score is at least `threshold`,
    /// best first, ties broken by key
    pub async fn retrieve(
        &self,
        query: &str,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<Vec<HybridCandidate>, DomainError> {
        let (dense, sparse) = tokio::try_join!(
            self.semantic_index
                .find_similar(embedding, self.config.dense_floor),
            self.lexical_index
                .search(query, self.config.sparse_candidates),
        )?;

        let mut scores: HashMap<String, Scores> = HashMap::new();

        for m in dense {
            scores
                .entry(m.matched_entry_key().to_string())
                .or_default()
                .dense = Some((m.similarity_score(), m.confidence()));
        }

        let max_sparse = sparse.iter().map(|s| s.score).fold(0.0f32, f32::max);

        if max_sparse > 0.0 {
            for s in sparse {
                scores.entry(s.key).or_default().sparse = Some(s.score / max_sparse);
            }
        }

        let alpha = self.config.alpha;

        let mut candidates: Vec<HybridCandidate> = scores
            .into_iter()
            .map(|(key, s)| {
                let (dense_score, dense_confidence) = s.dense.unwrap_or((0.0, 0.0));
                let sparse_score = s.sparse.unwrap_or(0.0);

                HybridCandidate {
                    key,
                    combined_score: alpha * dense_score + (1.0 - alpha) * sparse_score,
                    confidence: alpha * dense_confidence + (1.0 - alpha) * sparse_score,
                    dense_score: s.dense.map(|(score, _)| score),
                    sparse_score: s.sparse,
                }
            })
            .filter(|c| c.combined_score >= threshold)
            .collect();

        candidates.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        candidates.truncate(self.config.top_k);

        debug!(
            query_len = query.len(),
            candidates = candidates.len(),
            best = candidates.first().map(|c| c.combined_score),
            "Hybrid retrieval complete"
        );

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::SemanticMatch;
    use crate::domain::index::MockSemanticIndex;
    use crate::infrastructure::index::{Bm25Index, InMemorySemanticIndex};

    async fn retriever_with(
        semantic_index: MockSemanticIndex,
        documents: &[(&str, &str)],
    ) -> HybridRetriever {
        let lexical = Bm25Index::default();

        for (key, text) in documents {
            lexical.index_document(key, text).await.unwrap();
        }

        HybridRetriever::new(
            Arc::new(semantic_index),
            Arc::new(lexical),
            HybridConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_fusion_of_both_rankings() {
        let dense = MockSemanticIndex::new()
            .with_match(SemanticMatch::new("france", 0.8, 0.8).unwrap());
        let retriever = retriever_with(dense, &[("france", "capital of france")]).await;

        let candidates = retriever
            .retrieve("what's the capital of france", &[1.0], 0.85)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].combined_score - 0.9).abs() < 0.0001);
        assert!((candidates[0].confidence - 0.9).abs() < 0.0001);
        assert_eq!(candidates[0].sparse_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_single_ranking_contributes_one_term() {
        let dense = MockSemanticIndex::new()
            .with_match(SemanticMatch::new("dense-only", 0.9, 0.9).unwrap());
        let retriever = retriever_with(dense, &[("sparse-only", "rust traits")]).await;

        let candidates = retriever.retrieve("rust traits", &[1.0], 0.0).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].key, "sparse-only");
        assert!((candidates[0].combined_score - 0.5).abs() < 0.0001);
        assert_eq!(candidates[0].dense_score, None);
        assert_eq!(candidates[1].key, "dense-only");
        assert!((candidates[1].combined_score - 0.45).abs() < 0.0001);
        assert_eq!(candidates[1].sparse_score, None);
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_inclusive() {
        let at = MockSemanticIndex::new().with_match(SemanticMatch::new("k", 0.5, 0.5).unwrap());
        let retriever = retriever_with(at, &[("k", "borrow checker")]).await;

        let candidates = retriever.retrieve("borrow checker", &[1.0], 0.75).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].combined_score, 0.75);

        let candidates = retriever
            .retrieve("borrow checker", &[1.0], 0.75 + f32::EPSILON)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_and_ordering() {
        let semantic_index = InMemorySemanticIndex::new();
        let lexical = Bm25Index::default();

        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            semantic_index
                .index_embedding(key, vec![1.0, i as f32], IndexMetadata::new())
                .await
                .unwrap();
            lexical.index_document(key, "same text").await.unwrap();
        }

        let retriever = HybridRetriever::new(
            Arc::new(semantic_index),
            Arc::new(lexical),
            HybridConfig::default().with_top_k(2),
        );

        let candidates = retriever.retrieve("same text", &[1.0, 0.0], 0.0).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].key, "a");
        assert_eq!(candidates[1].key, "b");
    }

    #[tokio::test]
    async fn test_index_failure_propagates() {
        let dense = MockSemanticIndex::new().with_error("index offline");
        let retriever = retriever_with(dense, &[]).await;

        let error = retriever.retrieve("q", &[1.0], 0.5).await.unwrap_err();
        assert_eq!(error.kind(), "index");
    }

    #[tokio::test]
    async fn test_dense_failure_still_indexes_lexically() {
        let lexical = Arc::new(Bm25Index::default());
        let retriever = HybridRetriever::new(
            Arc::new(MockSemanticIndex::new().with_error("index offline")),
            lexical.clone(),
            HybridConfig::default(),
        );

        let error = retriever
            .index("k", "reset my password", vec![1.0], IndexMetadata::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind(), "index");
        assert_eq!(lexical.len().await.unwrap(), 1);
        assert_eq!(lexical.search("reset password", 5).await.unwrap()[0].key, "k");
    }

    #[tokio::test]
    async fn test_remove_from_both_indexes() {
        let semantic_index = Arc::new(InMemorySemanticIndex::new());
        let lexical = Arc::new(Bm25Index::default());
        let retriever = HybridRetriever::new(
            semantic_index.clone(),
            lexical.clone(),
            HybridConfig::default(),
        );

        retriever
            .index("k", "some text", vec![1.0], IndexMetadata::new())
            .await
            .unwrap();

        assert!(retriever.remove("k").await.unwrap());
        assert!(!retriever.remove("k").await.unwrap());
        assert_eq!(semantic_index.len().await.unwrap(), 0);
        assert_eq!(lexical.len().await.unwrap(), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(HybridConfig::default().validated().is_ok());
        assert!(HybridConfig::default().with_alpha(1.5).validated().is_err());
        assert!(HybridConfig::default().with_top_k(0).validated().is_err());
    }
}
