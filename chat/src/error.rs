//! Error types for chat sessions.

use notegraph_gateway::GatewayError;
use thiserror::Error;

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that can occur while chatting.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The model call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// There is no user turn waiting for a reply.
    #[error("no user message is waiting for a reply")]
    NoPendingTurn,
}
