//! OpenAI-compatible embedding generator

use async_trait::async_trait;
use serde::Deserialize;

use super::HttpClientTrait;
use crate::domain::embedding::EmbeddingGenerator;
use crate::domain::DomainError;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Known OpenAI embedding models and their dimensions
const EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// Dimension of a known model
pub fn model_dimension(model: &str) -> Option<usize> {
    EMBEDDING_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

/// Embedding generator calling a `/v1/embeddings` endpoint
#[derive(Debug)]
pub struct OpenAiEmbeddingGenerator<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl<C: HttpClientTrait> OpenAiEmbeddingGenerator<C> {
    /// Create a generator for the default model
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    /// Create a new generator with custom base URL
    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let api_key = api_key.into();
        let auth_header = format!("Bearer {}", api_key);
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: model_dimension(DEFAULT_EMBEDDING_MODEL).unwrap_or(1536),
        }
    }

    /// Use another model; the dimension comes from the known-model table
    /// unless given explicitly
    pub fn with_model(mut self, model: impl Into<String>, dimension: Option<usize>) -> Self {
        self.model = model.into();
        self.dimension = dimension
            .or_else(|| model_dimension(&self.model))
            .unwrap_or(self.dimension);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, text: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        // Only the v3 models accept a reduced dimension
        if self.model.starts_with("text-embedding-3")
            && model_dimension(&self.model) != Some(self.dimension)
        {
            body["dimensions"] = serde_json::json!(self.dimension);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<Vec<f32>, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::index(format!("Failed to parse embedding response: {}", e))
        })?;

        let embedding = response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| DomainError::index("Embedding response contained no data"))?;

        if embedding.len() != self.dimension {
            return Err(DomainError::index(format!(
                "Expected {}-dimensional embedding from {}, got {}",
                self.dimension,
                self.model,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingGenerator for OpenAiEmbeddingGenerator<C> {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let url = self.embeddings_url();
        let body = self.build_request(text);

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// OpenAI API types for embeddings

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::embedding::http_client::mock::MockHttpClient;
    use crate::infrastructure::embedding::HttpClient;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_URL: &str = "https://api.openai.com/v1/embeddings";

    fn create_mock_response(dimensions: usize) -> serde_json::Value {
        let embedding: Vec<f32> = (0..dimensions).map(|j| j as f32 * 0.001).collect();

        serde_json::json!({
            "object": "list",
            "model": "text-embedding-3-small",
            "data": [{"index": 0, "embedding": embedding, "object": "embedding"}],
            "usage": {"prompt_tokens": 3, "total_tokens": 3}
        })
    }

    #[tokio::test]
    async fn test_generate_embedding() {
        let client = MockHttpClient::new().with_response(TEST_URL, create_mock_response(1536));
        let generator = OpenAiEmbeddingGenerator::new(client, "test-api-key");

        let embedding = generator.generate_embedding("Hello world").await.unwrap();

        assert_eq!(embedding.len(), 1536);
        assert_eq!(generator.dimension(), 1536);
        assert_eq!(generator.name(), "openai");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_index_error() {
        let client = MockHttpClient::new().with_response(TEST_URL, create_mock_response(8));
        let generator = OpenAiEmbeddingGenerator::new(client, "test-api-key");

        let error = generator.generate_embedding("Hello").await.unwrap_err();
        assert_eq!(error.kind(), "index");
    }

    #[tokio::test]
    async fn test_reduced_dimension_is_requested() {
        let client = MockHttpClient::new().with_response(TEST_URL, create_mock_response(256));
        let generator = OpenAiEmbeddingGenerator::new(client, "test-api-key")
            .with_model("text-embedding-3-small", Some(256));

        generator.generate_embedding("Hello").await.unwrap();

        let bodies = generator.client.bodies();
        assert_eq!(bodies[0]["dimensions"], 256);
        assert_eq!(bodies[0]["input"], "Hello");
    }

    #[tokio::test]
    async fn test_endpoint_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "Rate limit exceeded");
        let generator = OpenAiEmbeddingGenerator::new(client, "test-api-key");

        assert!(generator.generate_embedding("Hello").await.is_err());
    }

    #[tokio::test]
    async fn test_against_http_server() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-ada-002",
                "input": "Test"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_mock_response(1536)))
            .mount(&server)
            .await;

        let generator = OpenAiEmbeddingGenerator::with_base_url(HttpClient::new(), "k", server.uri())
            .with_model("text-embedding-ada-002", None);

        let embedding = generator.generate_embedding("Test").await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }

    #[test]
    fn test_model_dimensions() {
        assert_eq!(model_dimension("text-embedding-3-large"), Some(3072));
        assert_eq!(model_dimension("unknown-model"), None);
    }
}
