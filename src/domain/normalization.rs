//! Query normalization and cheap match decisions

use std::collections::HashSet;

use crate::domain::cache::{CacheEntry, INTENT_TAG};

/// Number of leading tokens forming the intent bucket
pub const DEFAULT_INTENT_TOKENS: usize = 3;

/// Why a stored entry was judged reusable for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchReason {
    /// Normalized query equals the stored normalized query
    NormalizedText,
    /// Intent bucket equals the stored intent tag
    Intent,
    /// Token-set Jaccard similarity cleared the threshold
    TokenOverlap(f32),
}

impl MatchReason {
    /// Similarity reported with the hit; only token overlap is scored
    pub fn score(&self) -> Option<f32> {
        match self {
            Self::TokenOverlap(score) => Some(*score),
            Self::NormalizedText | Self::Intent => None,
        }
    }
}

/// Canonicalizes queries for exact matching and intent bucketing
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    intent_tokens: usize,
}

impl Default for QueryNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryNormalizer {
    pub fn new() -> Self {
        Self {
            intent_tokens: DEFAULT_INTENT_TOKENS,
        }
    }

    pub fn with_intent_tokens(mut self, intent_tokens: usize) -> Self {
        self.intent_tokens = intent_tokens.max(1);
        self
    }

    /// Lower-cased, trimmed form used for key derivation
    pub fn normalize(&self, query: &str) -> String {
        query.trim().to_lowercase()
    }

    /// First few normalized tokens
    pub fn extract_intent(&self, query: &str) -> String {
        self.normalize(query)
            .split_whitespace()
            .take(self.intent_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Token-set Jaccard similarity of the normalized forms
    pub fn similarity_score(&self, a: &str, b: &str) -> f32 {
        let a = self.normalize(a);
        let b = self.normalize(b);

        if a.is_empty() || b.is_empty() {
            return if a == b { 1.0 } else { 0.0 };
        }

        let a_tokens: HashSet<&str> = a.split_whitespace().collect();
        let b_tokens: HashSet<&str> = b.split_whitespace().collect();

        let intersection = a_tokens.intersection(&b_tokens).count();
        let union = a_tokens.union(&b_tokens).count();

        if union == 0 {
            return 0.0;
        }

        intersection as f32 / union as f32
    }

    /// First satisfied rule, checked in order: normalized text, intent, overlap
    pub fn match_reason(
        &self,
        query: &str,
        candidate: &CacheEntry,
        threshold: f32,
    ) -> Option<MatchReason> {
        let normalized = self.normalize(query);
        let stored = candidate.metadata().normalized_query();

        if stored == Some(normalized.as_str()) {
            return Some(MatchReason::NormalizedText);
        }

        let intent = self.extract_intent(query);

        if !intent.is_empty() && candidate.metadata().tag(INTENT_TAG) == Some(intent.as_str()) {
            return Some(MatchReason::Intent);
        }

        let stored = stored?;
        let score = self.similarity_score(&normalized, stored);

        (score >= threshold).then_some(MatchReason::TokenOverlap(score))
    }

    pub fn should_use_cached_response(
        &self,
        query: &str,
        candidate: &CacheEntry,
        threshold: f32,
    ) -> bool {
        self.match_reason(query, candidate, threshold).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(query: &str) -> CacheEntry {
        let normalizer = QueryNormalizer::new();

        CacheEntry::new("key", b"value".to_vec(), Utc::now())
            .unwrap()
            .with_normalized_query(normalizer.normalize(query))
            .with_tag(INTENT_TAG, normalizer.extract_intent(query))
    }

    #[test]
    fn test_normalize() {
        let normalizer = QueryNormalizer::new();
        assert_eq!(normalizer.normalize("  What is 2+2?  "), "what is 2+2?");
    }

    #[test]
    fn test_extract_intent() {
        let normalizer = QueryNormalizer::new();

        assert_eq!(
            normalizer.extract_intent("How do I sort a list in Rust"),
            "how do i"
        );
        assert_eq!(normalizer.extract_intent("Hello"), "hello");
        assert_eq!(normalizer.extract_intent("   "), "");

        let normalizer = QueryNormalizer::new().with_intent_tokens(1);
        assert_eq!(normalizer.extract_intent("How do I"), "how");
    }

    #[test]
    fn test_similarity_score() {
        let normalizer = QueryNormalizer::new();

        assert_eq!(normalizer.similarity_score("", ""), 1.0);
        assert_eq!(normalizer.similarity_score("", "abc"), 0.0);
        assert_eq!(normalizer.similarity_score("abc", " "), 0.0);
        assert_eq!(normalizer.similarity_score("a b", "A B"), 1.0);

        let score = normalizer.similarity_score("capital of france", "the capital of france");
        assert!((score - 0.75).abs() < 0.0001);
    }

    #[test]
    fn test_match_by_normalized_text() {
        let normalizer = QueryNormalizer::new();
        let entry = candidate("What is 2+2?");

        assert_eq!(
            normalizer.match_reason("  what is 2+2?", &entry, 0.99),
            Some(MatchReason::NormalizedText)
        );
    }

    #[test]
    fn test_match_by_intent() {
        let normalizer = QueryNormalizer::new();
        let entry = candidate("how do i sort a vector");

        let reason = normalizer.match_reason("How do I reverse a string", &entry, 0.99);

        assert_eq!(reason, Some(MatchReason::Intent));
        assert!(reason.unwrap().score().is_none());
    }

    #[test]
    fn test_match_by_token_overlap() {
        let normalizer = QueryNormalizer::new();
        let entry = candidate("the rust borrow checker rules");

        let reason = normalizer.match_reason("Rust borrow checker rules explained", &entry, 0.6);

        match reason {
            Some(MatchReason::TokenOverlap(score)) => assert!((score - 4.0 / 6.0).abs() < 0.0001),
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_no_match_below_threshold() {
        let normalizer = QueryNormalizer::new();
        let entry = candidate("capital of france");

        assert!(!normalizer.should_use_cached_response(
            "What's the capital of france",
            &entry,
            0.85
        ));
    }
}
