//! Model provider abstraction.
//!
//! A provider exposes two capabilities: chat-style completion and text
//! embedding. Concrete backends live in [`crate::cloud`] and [`crate::local`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GatewayError, Result};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions for the assistant.
    System,
    /// Text written by the user.
    User,
    /// Text produced by the model.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,

    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered conversation sent to a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Messages in conversation order.
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// Create a request from a full message history.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Create a single-turn request.
    pub fn single(system_prompt: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(input),
        ])
    }

    /// All system messages joined into one prompt.
    pub fn system_prompt(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The non-system part of the conversation as a single prompt.
    ///
    /// A lone user message is passed through verbatim; longer conversations
    /// are rendered as a transcript ending with an open assistant turn.
    pub fn prompt_text(&self) -> String {
        let turns: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();

        if let [only] = turns.as_slice() {
            if only.role == Role::User {
                return only.content.clone();
            }
        }

        let mut prompt = String::new();
        for turn in turns {
            let speaker = match turn.role {
                Role::User => "User",
                _ => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n\n", turn.content));
        }
        prompt.push_str("Assistant:");
        prompt
    }
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,

    /// Tokens produced by the model.
    pub output_tokens: u64,
}

/// Raw completion result from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCompletion {
    /// Generated text.
    pub text: String,

    /// Token usage, when the provider meters it.
    pub usage: Option<TokenUsage>,
}

/// Raw embedding result from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingOutput {
    /// The embedding vector.
    pub vector: Vec<f32>,

    /// Tokens consumed (if available).
    pub total_tokens: Option<u64>,
}

/// Trait for model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model used for completions.
    fn completion_model(&self) -> &str;

    /// Model used for embeddings.
    fn embedding_model(&self) -> &str;

    /// Generate a completion for the given conversation.
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderCompletion>;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput>;

    /// Check if the provider has everything it needs to make calls.
    fn is_available(&self) -> bool;
}

/// Turn a non-success response into [`GatewayError::Provider`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Provider {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, logging the raw payload when it has the wrong shape.
pub(crate) async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let raw = response.text().await?;
    serde_json::from_str(&raw).map_err(|e| {
        warn!("Malformed provider response ({e}): {raw}");
        GatewayError::Protocol(e.to_string())
    })
}
