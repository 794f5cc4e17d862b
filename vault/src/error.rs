//! Error types for the vault.

use notegraph_chat::ChatError;
use notegraph_embeddings::EmbeddingError;
use notegraph_gateway::GatewayError;
use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur in the vault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// An operation needs an open note but none was given.
    #[error("no active note: open a note first")]
    AbsentNote,

    /// The note does not exist in the store.
    #[error("note not found: {0}")]
    NoteNotFound(String),

    /// Vault directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Model call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Chat session failed.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Embedding cache rejected a vector.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Short description suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(e) => e.user_message(),
            Self::Chat(ChatError::Gateway(e)) => e.user_message(),
            other => other.to_string(),
        }
    }
}
