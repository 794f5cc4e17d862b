//! One-shot model actions over a single note.

use std::sync::Arc;

use notegraph_gateway::{Completion, Gateway};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::store::NoteStore;

const SUMMARIZE_PROMPT: &str = "Summarize the following note in a few sentences. \
Keep names, dates and decisions. Reply with the summary only.";

const ANALYZE_PROMPT: &str = "Analyze the following note. List its main themes, \
open questions and possible next steps as short Markdown bullet points.";

/// Stateless completions over note content.
pub struct NoteActions {
    store: Arc<dyn NoteStore>,
    gateway: Arc<Gateway>,
}

impl NoteActions {
    pub fn new(store: Arc<dyn NoteStore>, gateway: Arc<Gateway>) -> Self {
        Self { store, gateway }
    }

    /// Summarize a note.
    pub async fn summarize(&self, note_id: &str) -> Result<Completion> {
        self.run(note_id, SUMMARIZE_PROMPT).await
    }

    /// Analyze a note's themes and open questions.
    pub async fn analyze(&self, note_id: &str) -> Result<Completion> {
        self.run(note_id, ANALYZE_PROMPT).await
    }

    async fn run(&self, note_id: &str, system_prompt: &str) -> Result<Completion> {
        if note_id.trim().is_empty() {
            return Err(VaultError::AbsentNote);
        }

        let content = self.store.read_content(note_id).await?;
        let completion = self.gateway.complete(&content, system_prompt).await?;
        debug!("Completed action on {note_id}");
        Ok(completion)
    }
}
