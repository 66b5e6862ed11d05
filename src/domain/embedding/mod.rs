//! Embedding domain - generator port and similarity math

mod generator;
mod similarity;

pub use generator::EmbeddingGenerator;
pub use similarity::{clamped_cosine_similarity, cosine_similarity, l2_normalize};

#[cfg(test)]
pub use generator::mock::MockEmbeddingGenerator;
