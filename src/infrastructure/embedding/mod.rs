//! Embedding generator implementations

mod hashing;
pub(crate) mod http_client;
mod openai;

pub use hashing::{HashingEmbeddingGenerator, DEFAULT_HASHING_DIMENSION};
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::{model_dimension, OpenAiEmbeddingGenerator, DEFAULT_EMBEDDING_MODEL};
