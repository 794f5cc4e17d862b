//! # Gateway
//!
//! A uniform entry point for text completions and embeddings backed by one of
//! several interchangeable model providers.
//!
//! ## Features
//!
//! - **Provider Abstraction**: Cloud (OpenAI-compatible) and local
//!   (Ollama-compatible) backends behind one [`ModelProvider`] trait
//! - **Usage Metering**: Token counts and USD cost per completion
//! - **Input Validation**: Blank inputs never reach a provider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Gateway                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ProviderConfig ──► ModelProvider ──► Completion / Embedding    │
//! │                          │                  │                   │
//! │                          ▼                  ▼                   │
//! │               CloudProvider/LocalProvider  PriceTable ──► Usage │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cloud;
pub mod config;
pub mod error;
pub mod gateway;
pub mod local;
pub mod pricing;
pub mod provider;

pub use cloud::CloudProvider;
pub use config::{ProviderConfig, ProviderKind};
pub use error::{GatewayError, Result};
pub use gateway::{Completion, Gateway, UsageObserver, UsageReport};
pub use local::LocalProvider;
pub use pricing::{ModelPrice, completion_cost, price_for};
pub use provider::{
    ChatMessage, CompletionRequest, EmbeddingOutput, ModelProvider, ProviderCompletion, Role,
    TokenUsage,
};
