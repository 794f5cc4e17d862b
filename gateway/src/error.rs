//! Error types for the gateway.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to a model provider.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Provider is missing a credential or other required setting.
    #[error("provider not configured: {0}")]
    Configuration(String),

    /// Provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    /// Response did not have the expected shape.
    #[error("unexpected provider response: {0}")]
    Protocol(String),

    /// Blank text was passed where content is required.
    #[error("input text is empty")]
    EmptyInput,

    /// Request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(detail) => {
                format!("The AI provider is not configured ({detail}). Check your settings.")
            }
            Self::Provider { status, .. } => {
                format!("The AI provider rejected the request (HTTP {status}).")
            }
            Self::Protocol(_) => "The AI provider sent a response that could not be read.".to_string(),
            Self::EmptyInput => "There is no text to send.".to_string(),
            Self::Transport(_) => "Could not reach the AI provider.".to_string(),
        }
    }

    /// Whether the error concerns a single input and can be skipped in a batch.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyInput)
    }
}
