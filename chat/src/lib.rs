//! # Chat
//!
//! Conversational context management on top of the gateway.
//!
//! A [`ContextManager`] keeps one bounded, role-tagged [`ChatSession`],
//! injects the active note's content as a transient system message around
//! each model call, and accumulates [`UsageStats`] for the session.

pub mod config;
pub mod error;
pub mod manager;
pub mod session;
pub mod usage;

pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use manager::ContextManager;
pub use notegraph_gateway::{ChatMessage, Role};
pub use session::{ChatSession, NOTE_CONTEXT_MARKER};
pub use usage::UsageStats;
