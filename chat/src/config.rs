//! Configuration for chat sessions.

use serde::{Deserialize, Serialize};

/// Instructions every session starts with.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for a personal note collection. \
Answer questions about the user's notes, and use the current note's content when it is provided.";

/// Configuration for a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Leading system message describing assistant behaviour.
    pub system_prompt: String,

    /// Maximum number of messages kept in history, system message included.
    pub max_messages: usize,

    /// Whether clearing history also resets usage statistics.
    pub reset_usage_on_clear: bool,
}

impl ChatConfig {
    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the history limit.
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Reset usage statistics whenever history is cleared.
    pub fn reset_usage_on_clear(mut self) -> Self {
        self.reset_usage_on_clear = true;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_messages: 50,
            reset_usage_on_clear: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ChatConfig = serde_json::from_str(r#"{"max_messages": 10}"#).unwrap();
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(!config.reset_usage_on_clear);
    }
}
