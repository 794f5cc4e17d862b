//! Chat history.

use notegraph_gateway::{ChatMessage, Role};
use tracing::debug;
use uuid::Uuid;

/// Prefix of the transient system message carrying the active note.
pub const NOTE_CONTEXT_MARKER: &str = "Current note content:\n";

/// Smallest usable history: the system message and one turn.
const MIN_MESSAGES: usize = 2;

/// An ordered, bounded message history.
///
/// The first message is always the session's system prompt. Messages that
/// start with [`NOTE_CONTEXT_MARKER`] are transient and are removed with
/// [`ChatSession::strip_note_context`].
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    system_prompt: String,
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl ChatSession {
    /// Create a session holding only the system prompt.
    pub fn new(system_prompt: impl Into<String>, max_messages: usize) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            id: Uuid::new_v4(),
            messages: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            max_messages: max_messages.max(MIN_MESSAGES),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Messages in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system prompt is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Role of the newest permanent message.
    pub fn last_role(&self) -> Option<Role> {
        self.messages
            .iter()
            .rev()
            .find(|m| !is_note_context(m))
            .map(|m| m.role)
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    /// Append an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    /// Append the active note's content as a transient system message.
    pub fn push_note_context(&mut self, note_content: &str) {
        self.messages.push(ChatMessage::system(format!(
            "{NOTE_CONTEXT_MARKER}{note_content}"
        )));
    }

    /// Remove every transient note-content message.
    pub fn strip_note_context(&mut self) {
        self.messages.retain(|m| !is_note_context(m));
    }

    /// Reset to the single system prompt.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages
            .push(ChatMessage::system(self.system_prompt.clone()));
    }

    /// Put back a history captured earlier with [`ChatSession::messages`].
    pub(crate) fn restore(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);

        let excess = self.messages.len().saturating_sub(self.max_messages);
        if excess > 0 {
            self.messages.drain(1..=excess);
            debug!("Dropped {excess} old messages from chat {}", self.id);
        }
    }
}

fn is_note_context(message: &ChatMessage) -> bool {
    message.role == Role::System && message.content.starts_with(NOTE_CONTEXT_MARKER)
}
