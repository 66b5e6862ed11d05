//! Sparse (lexical) index port

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::DomainError;

/// Raw lexical relevance of a document for a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalScore {
    pub key: String,
    /// Unbounded, non-negative relevance (BM25 scale for the default index)
    pub score: f32,
}

impl LexicalScore {
    pub fn new(key: impl Into<String>, score: f32) -> Self {
        Self {
            key: key.into(),
            score,
        }
    }
}

/// Term-frequency ranking over stored query texts
#[async_trait]
pub trait LexicalIndex: Send + Sync + Debug {
    /// Index (or replace) the text stored for a key
    async fn index_document(&self, key: &str, text: &str) -> Result<(), DomainError>;

    /// Best `limit` documents with a positive score, sorted descending
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LexicalScore>, DomainError>;

    /// Remove a document, returns true if it was indexed
    async fn remove_document(&self, key: &str) -> Result<bool, DomainError>;

    async fn clear(&self) -> Result<(), DomainError>;

    async fn len(&self) -> Result<usize, DomainError>;
}
