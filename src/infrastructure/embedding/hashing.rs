//! Local feature-hashing embedding generator
//!
//! Projects word unigrams and bigrams onto a fixed number of buckets with a
//! signed hash, then L2-normalizes. Texts sharing vocabulary land close to
//! each other in cosine space; no model or network access is needed.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::embedding::{l2_normalize, EmbeddingGenerator};
use crate::domain::DomainError;
use crate::infrastructure::text::tokenize;

pub const DEFAULT_HASHING_DIMENSION: usize = 256;

const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbeddingGenerator {
    dimension: usize,
}

impl Default for HashingEmbeddingGenerator {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl HashingEmbeddingGenerator {
    pub fn new(dimension: usize) -> Result<Self, DomainError> {
        if dimension == 0 {
            return Err(DomainError::configuration(
                "Embedding dimension must be greater than zero",
            ));
        }

        Ok(Self { dimension })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);

        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[index] += sign * weight;
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0; self.dimension];

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }

        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingGenerator for HashingEmbeddingGenerator {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::cosine_similarity;

    #[tokio::test]
    async fn test_embedding_is_deterministic_and_normalized() {
        let generator = HashingEmbeddingGenerator::default();

        let a = generator.generate_embedding("What is Rust?").await.unwrap();
        let b = generator.generate_embedding("what is rust").await.unwrap();

        assert_eq!(a.len(), DEFAULT_HASHING_DIMENSION);
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.0001);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let generator = HashingEmbeddingGenerator::new(512).unwrap();

        let base = generator
            .generate_embedding("how do i sort a vector in rust")
            .await
            .unwrap();
        let related = generator
            .generate_embedding("sort a vector in rust")
            .await
            .unwrap();
        let unrelated = generator
            .generate_embedding("weather forecast for tomorrow")
            .await
            .unwrap();

        assert!(cosine_similarity(&base, &related) > cosine_similarity(&base, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let generator = HashingEmbeddingGenerator::new(16).unwrap();
        let vector = generator.generate_embedding("   ").await.unwrap();
        assert!(vector.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbeddingGenerator::new(0).is_err());
    }
}
