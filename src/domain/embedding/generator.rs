//! Embedding generator port

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Turns text into a fixed-dimension vector
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync + Debug {
    /// Generate the embedding for a single text
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Length of every vector this generator returns
    fn dimension(&self) -> usize;

    /// Generator name, used in logs
    fn name(&self) -> &'static str;
}
