//! Conversational context manager.

use std::sync::Arc;

use notegraph_gateway::{ChatMessage, Gateway, GatewayError, Role};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::session::ChatSession;
use crate::usage::UsageStats;

type UsageCallback = Box<dyn Fn(&UsageStats) + Send + Sync>;

/// Owns one chat session and forwards it to the gateway.
///
/// Usage is pushed to subscribers registered with
/// [`ContextManager::subscribe_usage`]; nothing calls back into the caller
/// otherwise.
pub struct ContextManager {
    gateway: Arc<Gateway>,
    config: ChatConfig,
    session: ChatSession,
    usage: UsageStats,
    subscribers: Vec<UsageCallback>,
}

impl ContextManager {
    /// Create a manager with a fresh session.
    pub fn new(gateway: Arc<Gateway>, config: ChatConfig) -> Self {
        let session = ChatSession::new(config.system_prompt.clone(), config.max_messages);
        Self {
            gateway,
            config,
            session,
            usage: UsageStats::default(),
            subscribers: Vec::new(),
        }
    }

    /// Session identifier.
    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// Permanent history.
    pub fn history(&self) -> &[ChatMessage] {
        self.session.messages()
    }

    /// Usage accumulated by this session.
    pub fn usage(&self) -> UsageStats {
        self.usage
    }

    /// Call `callback` with the new totals after every metered reply.
    pub fn subscribe_usage<F>(&mut self, callback: F)
    where
        F: Fn(&UsageStats) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Add a user message to the history.
    pub fn append_user_turn(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyInput.into());
        }
        self.session.push_user(text);
        Ok(())
    }

    /// Send the history to the model and record its reply.
    ///
    /// When `current_note` is given it is attached as a transient system
    /// message for this call only. It is removed again whether or not the
    /// call succeeds; on failure the history is otherwise unchanged.
    pub async fn compose_and_send(&mut self, current_note: Option<&str>) -> Result<String> {
        if self.session.last_role() != Some(Role::User) {
            return Err(ChatError::NoPendingTurn);
        }

        if let Some(content) = current_note.filter(|c| !c.trim().is_empty()) {
            self.session.push_note_context(content);
        }

        let result = self
            .gateway
            .complete_messages(self.session.messages())
            .await;
        self.session.strip_note_context();

        let completion = result.inspect_err(|e| warn!("Chat completion failed: {e}"))?;

        self.session.push_assistant(completion.text.clone());

        if let Some(ref report) = completion.usage {
            self.usage.record(report);
            debug!(
                "Chat {} usage: ${:.6}, {} tokens",
                self.session.id(),
                self.usage.cost_usd,
                self.usage.total_tokens()
            );
            for subscriber in &self.subscribers {
                subscriber(&self.usage);
            }
        }

        Ok(completion.text)
    }

    /// Append a user turn and send it in one step.
    ///
    /// On failure the history is exactly as it was before the call.
    pub async fn ask(&mut self, text: &str, current_note: Option<&str>) -> Result<String> {
        // Appending may evict old messages, so keep the whole history.
        let before = self.session.messages().to_vec();
        self.append_user_turn(text)?;

        let result = self.compose_and_send(current_note).await;
        if result.is_err() {
            self.session.restore(before);
        }
        result
    }

    /// Reset history to the system prompt.
    ///
    /// Usage statistics survive unless the configuration asks otherwise.
    pub fn clear_history(&mut self) {
        self.session.clear();
        if self.config.reset_usage_on_clear {
            self.usage = UsageStats::default();
            for subscriber in &self.subscribers {
                subscriber(&self.usage);
            }
        }
        info!("Cleared chat history for session {}", self.session.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NOTE_CONTEXT_MARKER;
    use async_trait::async_trait;
    use notegraph_gateway::{
        CompletionRequest, EmbeddingOutput, ModelProvider, ProviderCompletion, TokenUsage,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Provider that records requests and either replies or fails.
    struct RecordingProvider {
        requests: Mutex<Vec<CompletionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl ModelProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn completion_model(&self) -> &str {
            "gpt-4o-mini"
        }

        fn embedding_model(&self) -> &str {
            "none"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> notegraph_gateway::Result<ProviderCompletion> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(GatewayError::Provider {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(ProviderCompletion {
                text: format!("reply {}", request.messages.len()),
                usage: Some(TokenUsage {
                    input_tokens: 1000,
                    output_tokens: 500,
                }),
            })
        }

        async fn embed(&self, _text: &str) -> notegraph_gateway::Result<EmbeddingOutput> {
            Err(GatewayError::Configuration("no embeddings".to_string()))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn manager(fail: bool, config: ChatConfig) -> (ContextManager, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider {
            requests: Mutex::new(Vec::new()),
            fail,
        });
        let gateway = Arc::new(Gateway::new(provider.clone()));
        (ContextManager::new(gateway, config), provider)
    }

    fn has_note_context(messages: &[ChatMessage]) -> bool {
        messages
            .iter()
            .any(|m| m.content.starts_with(NOTE_CONTEXT_MARKER))
    }

    #[tokio::test]
    async fn test_note_context_sent_but_not_kept() {
        let (mut chat, provider) = manager(false, ChatConfig::default());

        let reply = chat
            .ask("What does my note say?", Some("# Trip\nPack boots."))
            .await
            .unwrap();
        assert_eq!(reply, "reply 3");

        let requests = provider.requests.lock().unwrap();
        let sent = &requests[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], ChatMessage::user("What does my note say?"));
        assert_eq!(
            sent[2],
            ChatMessage::system(format!("{NOTE_CONTEXT_MARKER}# Trip\nPack boots."))
        );

        assert!(!has_note_context(chat.history()));
        assert_eq!(chat.history().len(), 3);
        assert_eq!(chat.history()[2], ChatMessage::assistant("reply 3"));
    }

    #[tokio::test]
    async fn test_note_context_stripped_on_failure() {
        let (mut chat, _provider) = manager(true, ChatConfig::default());

        chat.append_user_turn("Summarize").unwrap();
        let err = chat
            .compose_and_send(Some("long note body"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChatError::Gateway(GatewayError::Provider { status: 500, .. })
        ));
        assert!(!has_note_context(chat.history()));
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.usage(), UsageStats::default());
    }

    #[tokio::test]
    async fn test_failed_ask_leaves_history_unchanged() {
        let (mut chat, provider) = manager(true, ChatConfig::default().with_max_messages(2));
        let session_id = chat.session_id();

        assert!(chat.ask("first question", None).await.is_err());
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.history()[0].role, Role::System);

        assert!(chat.ask("second question", Some("note")).await.is_err());
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.session_id(), session_id);

        let requests = provider.requests.lock().unwrap();
        let sent = &requests[1].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], ChatMessage::user("second question"));
        assert_eq!(sent[2].role, Role::System);
    }

    #[tokio::test]
    async fn test_usage_accumulates_and_notifies() {
        let (mut chat, _provider) = manager(false, ChatConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        chat.subscribe_usage(move |stats| sink.lock().unwrap().push(*stats));

        chat.ask("one", None).await.unwrap();
        chat.ask("two", None).await.unwrap();

        let usage = chat.usage();
        assert_eq!(usage.input_tokens, 2000);
        assert_eq!(usage.output_tokens, 1000);
        assert!((usage.cost_usd - 2.0 * (0.000_15 + 0.5 * 0.000_6)).abs() < 1e-12);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_keeps_usage_by_default() {
        let (mut chat, _provider) = manager(false, ChatConfig::default());
        chat.ask("hello", None).await.unwrap();

        chat.clear_history();
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.history()[0].role, Role::System);
        assert_eq!(chat.usage().input_tokens, 1000);
    }

    #[tokio::test]
    async fn test_clear_can_reset_usage() {
        let (mut chat, _provider) = manager(false, ChatConfig::default().reset_usage_on_clear());
        chat.ask("hello", None).await.unwrap();

        chat.clear_history();
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.usage(), UsageStats::default());
    }

    #[tokio::test]
    async fn test_send_requires_pending_turn() {
        let (mut chat, provider) = manager(false, ChatConfig::default());

        assert!(matches!(
            chat.compose_and_send(Some("note")).await,
            Err(ChatError::NoPendingTurn)
        ));
        assert!(matches!(
            chat.append_user_turn("   "),
            Err(ChatError::Gateway(GatewayError::EmptyInput))
        ));
        assert!(provider.requests.lock().unwrap().is_empty());
        assert!(!has_note_context(chat.history()));
    }
}
