//! Cloud provider speaking the OpenAI-compatible REST API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::provider::{
    CompletionRequest, EmbeddingOutput, ModelProvider, ProviderCompletion, TokenUsage,
    check_status, decode_body,
};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Cloud completion and embedding provider.
pub struct CloudProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model for chat completions.
    completion_model: String,

    /// Model for embeddings.
    embedding_model: String,
}

impl CloudProvider {
    /// Create a new cloud provider, reading the key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the completion model.
    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GatewayError::Configuration("missing API key".to_string()))
    }
}

impl Default for CloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for CloudProvider {
    fn name(&self) -> &str {
        "cloud"
    }

    fn completion_model(&self) -> &str {
        &self.completion_model
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderCompletion> {
        let api_key = self.api_key()?;

        debug!(
            "Requesting completion with model {} ({} messages)",
            self.completion_model,
            request.messages.len()
        );

        let body = serde_json::json!({
            "model": self.completion_model,
            "messages": request.messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let result: ChatCompletionResponse = decode_body(response).await?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GatewayError::Protocol("no message content in response".to_string()))?;

        let usage = result.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        Ok(ProviderCompletion { text, usage })
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingOutput> {
        let api_key = self.api_key()?;

        debug!("Generating embedding with model: {}", self.embedding_model);

        let body = serde_json::json!({
            "input": text,
            "model": self.embedding_model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let result: EmbeddingResponse = decode_body(response).await?;

        let vector = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Protocol("no embedding in response".to_string()))?
            .embedding;

        info!("Generated embedding with {} dimensions", vector.len());

        Ok(EmbeddingOutput {
            vector,
            total_tokens: result.usage.map(|u| u.total_tokens),
        })
    }

    fn is_available(&self) -> bool {
        self.api_key().is_ok()
    }
}

/// Chat completion response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Embedding response format.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}
