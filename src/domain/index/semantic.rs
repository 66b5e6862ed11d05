//! Dense (embedding) index port

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::cache::SemanticMatch;
use crate::domain::DomainError;

/// Free-form metadata stored alongside an indexed embedding
pub type IndexMetadata = BTreeMap<String, String>;

/// Nearest-neighbour search over indexed embeddings
#[async_trait]
pub trait SemanticIndex: Send + Sync + Debug {
    /// Index (or replace) the embedding stored for a key
    async fn index_embedding(
        &self,
        key: &str,
        vector: Vec<f32>,
        metadata: IndexMetadata,
    ) -> Result<(), DomainError>;

    /// Matches with similarity >= threshold, sorted by similarity descending
    async fn find_similar(
        &self,
        vector: &[f32],
        threshold: f32,
    ) -> Result<Vec<SemanticMatch>, DomainError>;

    /// Remove the embedding of a key, returns true if it was indexed
    async fn remove_embedding(&self, key: &str) -> Result<bool, DomainError>;

    /// Drop every indexed embedding
    async fn clear(&self) -> Result<(), DomainError>;

    /// Number of indexed embeddings
    async fn len(&self) -> Result<usize, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Index returning canned matches, or failing
    #[derive(Debug, Default)]
    pub struct MockSemanticIndex {
        matches: Mutex<Vec<SemanticMatch>>,
        removed: Mutex<Vec<String>>,
        error: Option<String>,
    }

    impl MockSemanticIndex {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_match(self, semantic_match: SemanticMatch) -> Self {
            self.matches.lock().unwrap().push(semantic_match);
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn removed(&self) -> Vec<String> {
            self.removed.lock().unwrap().clone()
        }

        fn check_error(&self) -> Result<(), DomainError> {
            match self.error {
                Some(ref error) => Err(DomainError::index(error.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SemanticIndex for MockSemanticIndex {
        async fn index_embedding(
            &self,
            _key: &str,
            _vector: Vec<f32>,
            _metadata: IndexMetadata,
        ) -> Result<(), DomainError> {
            self.check_error()
        }

        async fn find_similar(
            &self,
            _vector: &[f32],
            threshold: f32,
        ) -> Result<Vec<SemanticMatch>, DomainError> {
            self.check_error()?;

            Ok(self
                .matches
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.similarity_score() >= threshold)
                .cloned()
                .collect())
        }

        async fn remove_embedding(&self, key: &str) -> Result<bool, DomainError> {
            self.check_error()?;
            self.removed.lock().unwrap().push(key.to_string());
            Ok(true)
        }

        async fn clear(&self) -> Result<(), DomainError> {
            self.check_error()
        }

        async fn len(&self) -> Result<usize, DomainError> {
            self.check_error()?;
            Ok(self.matches.lock().unwrap().len())
        }
    }
}
