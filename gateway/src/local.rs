//! Local provider speaking the Ollama generate/embeddings API.
//!
//! Local models are free to run, so no token usage is reported.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::provider::{
    CompletionRequest, EmbeddingOutput, ModelProvider, ProviderCompletion, check_status,
    decode_body,
};

/// Default endpoint of a local server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default generation model.
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Local completion and embedding provider.
pub struct LocalProvider {
    base_url: String,
    client: reqwest::Client,
    completion_model: String,
    embedding_model: String,
}

impl LocalProvider {
    /// Create a provider for the default local endpoint.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Set the endpoint URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the generation model.
    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn endpoint(&self, route: &str) -> Result<String> {
        if self.base_url.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "missing local endpoint URL".to_string(),
            ));
        }
        Ok(format!("{}{route}", self.base_url))
    }

    fn require_model(model: &str) -> Result<&str> {
        if model.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "missing local model name".to_string(),
            ));
        }
        Ok(model)
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn completion_model(&self) -> &str {
        &self.completion_model
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderCompletion> {
        let url = self.endpoint("/api/generate")?;
        let model = Self::require_model(&self.completion_model)?;

        debug!("Requesting local generation with model {model}");

        let mut body = serde_json::json!({
            "model": model,
            "prompt": request.prompt_text(),
            "stream": false,
        });

        let system = request.system_prompt();
        if !system.is_empty() {
            body["system"] = serde_json::json!(system);
        }

        let response = self.client.post(url).json(&body).send().await?;
        let response = check_status(response).await?;

        let result: GenerateResponse = decode_body(response).await?;

        Ok(ProviderCompletion {
            text: result.response,
            usage: None,
        })
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingOutput> {
        let url = self.endpoint("/api/embeddings")?;
        let model = Self::require_model(&self.embedding_model)?;

        debug!("Generating local embedding with model {model}");

        let body = serde_json::json!({
            "model": model,
            "prompt": text,
        });

        let response = self.client.post(url).json(&body).send().await?;
        let response = check_status(response).await?;

        let result: LocalEmbeddingResponse = decode_body(response).await?;

        Ok(EmbeddingOutput {
            vector: result.embedding,
            total_tokens: None,
        })
    }

    fn is_available(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct LocalEmbeddingResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_sends_system_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3",
                "system": "Be brief.",
                "prompt": "Explain",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3",
                "response": "Done.",
                "done": true
            })))
            .mount(&server)
            .await;

        let provider = LocalProvider::new().with_base_url(server.uri());
        let completion = provider
            .complete(&CompletionRequest::new(vec![
                ChatMessage::system("Be brief."),
                ChatMessage::user("Explain"),
            ]))
            .await
            .unwrap();

        assert_eq!(completion.text, "Done.");
        assert_eq!(completion.usage, None);
    }

    #[tokio::test]
    async fn test_embeddings_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [1.0, 0.5]
            })))
            .mount(&server)
            .await;

        let provider = LocalProvider::new().with_base_url(format!("{}/", server.uri()));
        let output = provider.embed("note body").await.unwrap();
        assert_eq!(output.vector, vec![1.0, 0.5]);
        assert_eq!(output.total_tokens, None);
    }

    #[tokio::test]
    async fn test_missing_model_is_configuration_error() {
        let provider = LocalProvider::new().with_embedding_model("");
        let err = provider.embed("note body").await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
