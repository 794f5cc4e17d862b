//! Related-note discovery with short model-written explanations.

use std::sync::Arc;

use futures::future::join_all;
use notegraph_embeddings::{SearchOptions, SimilarityResult};
use notegraph_gateway::Gateway;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, VaultError};
use crate::indexer::Indexer;
use crate::store::{NOTE_EXTENSION, NoteStore};

/// Heading of the section written by [`RelatedNotes::append_section`].
pub const RELATED_SECTION_HEADING: &str = "## Related notes";

/// Explanations requested concurrently.
const EXPLAIN_BATCH_SIZE: usize = 5;

/// Characters of each note shown to the model.
const EXCERPT_CHARS: usize = 2000;

const EXPLAIN_SYSTEM_PROMPT: &str = "You compare two notes from a personal knowledge base. \
Reply with one sentence describing how the second note relates to the first. \
Do not repeat the note titles.";

/// A note similar to the one being viewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedNote {
    /// Identifier of the related note.
    pub note_id: String,

    /// Cosine similarity to the source note.
    pub similarity: f32,

    /// One-sentence comparison, when the model produced one.
    pub explanation: Option<String>,
}

/// Finds and links notes similar to a given note.
pub struct RelatedNotes {
    indexer: Arc<Indexer>,
    store: Arc<dyn NoteStore>,
    gateway: Arc<Gateway>,
    options: SearchOptions,
}

impl RelatedNotes {
    pub fn new(indexer: Arc<Indexer>, store: Arc<dyn NoteStore>, gateway: Arc<Gateway>) -> Self {
        Self {
            indexer,
            store,
            gateway,
            options: SearchOptions::related(),
        }
    }

    /// Override the search parameters.
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Notes related to `note_id`, most similar first.
    ///
    /// The source note is re-embedded first so the search reflects its
    /// current content. Hits whose note can no longer be read are dropped.
    pub async fn find(&self, note_id: &str) -> Result<Vec<RelatedNote>> {
        if note_id.trim().is_empty() {
            return Err(VaultError::AbsentNote);
        }

        let source = self.store.read_content(note_id).await?;
        self.indexer.reindex_one(note_id).await?;

        let hits = self.indexer.search_related(note_id, &self.options).await?;
        debug!("Found {} candidates related to {note_id}", hits.len());

        let mut related = Vec::with_capacity(hits.len());
        for batch in hits.chunks(EXPLAIN_BATCH_SIZE) {
            let results = join_all(batch.iter().map(|hit| self.explain(&source, hit))).await;
            related.extend(results.into_iter().flatten());
        }

        info!("{} notes related to {note_id}", related.len());
        Ok(related)
    }

    /// Write a related-notes section at the end of `note_id`.
    ///
    /// A section written earlier is replaced. Nothing is written for an
    /// empty list.
    pub async fn append_section(&self, note_id: &str, related: &[RelatedNote]) -> Result<()> {
        if note_id.trim().is_empty() {
            return Err(VaultError::AbsentNote);
        }
        if related.is_empty() {
            return Ok(());
        }

        let content = self.store.read_content(note_id).await?;
        let updated = with_related_section(&content, related);
        self.store.write_content(note_id, &updated).await
    }

    async fn explain(&self, source: &str, hit: &SimilarityResult) -> Option<RelatedNote> {
        let other = match self.store.read_content(&hit.note_id).await {
            Ok(content) => content,
            Err(e) => {
                debug!("Skipping unreadable related note {}: {e}", hit.note_id);
                return None;
            }
        };

        let input = format!(
            "First note:\n{}\n\nSecond note:\n{}",
            excerpt(source),
            excerpt(&other)
        );
        let explanation = match self.gateway.complete(&input, EXPLAIN_SYSTEM_PROMPT).await {
            Ok(completion) => Some(completion.text.trim().to_string()),
            Err(e) => {
                warn!("No explanation for {}: {e}", hit.note_id);
                None
            }
        };

        Some(RelatedNote {
            note_id: hit.note_id.clone(),
            similarity: hit.similarity,
            explanation,
        })
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn link_target(note_id: &str) -> &str {
    note_id
        .strip_suffix(NOTE_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(note_id)
}

fn with_related_section(content: &str, related: &[RelatedNote]) -> String {
    // Drop a previous section: everything from its heading up to the next
    // heading of the same or higher level.
    let mut kept = Vec::new();
    let mut in_section = false;
    for line in content.lines() {
        if line.trim_end() == RELATED_SECTION_HEADING {
            in_section = true;
            continue;
        }
        if in_section && (line.starts_with("# ") || line.starts_with("## ")) {
            in_section = false;
        }
        if !in_section {
            kept.push(line);
        }
    }

    let mut out = kept.join("\n").trim_end().to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(RELATED_SECTION_HEADING);
    out.push('\n');
    for note in related {
        out.push_str(&format!("\n- [[{}]]", link_target(&note.note_id)));
        if let Some(ref explanation) = note.explanation {
            out.push_str(&format!(": {explanation}"));
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexerConfig;
    use crate::state::{AppState, Settings};
    use crate::store::MemoryNoteStore;
    use async_trait::async_trait;
    use notegraph_gateway::{
        CompletionRequest, EmbeddingOutput, GatewayError, ModelProvider, ProviderCompletion,
    };
    use pretty_assertions::assert_eq;

    /// Embeds by keyword; explains unless the other note mentions "mute".
    struct KeywordProvider;

    #[async_trait]
    impl ModelProvider for KeywordProvider {
        fn name(&self) -> &str {
            "keywords"
        }

        fn completion_model(&self) -> &str {
            "keywords"
        }

        fn embedding_model(&self) -> &str {
            "keywords"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> notegraph_gateway::Result<ProviderCompletion> {
            if request.prompt_text().contains("mute") {
                return Err(GatewayError::Provider {
                    status: 503,
                    body: "busy".to_string(),
                });
            }
            Ok(ProviderCompletion {
                text: " Both are about gardening. ".to_string(),
                usage: None,
            })
        }

        async fn embed(&self, text: &str) -> notegraph_gateway::Result<EmbeddingOutput> {
            let vector = ["garden", "tomato", "tax"]
                .iter()
                .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
                .chain(std::iter::once(0.1))
                .collect();
            Ok(EmbeddingOutput {
                vector,
                total_tokens: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    async fn setup() -> (RelatedNotes, Arc<MemoryNoteStore>, Arc<Indexer>) {
        let store = Arc::new(MemoryNoteStore::new());
        let gateway = Arc::new(Gateway::new(Arc::new(KeywordProvider)));
        let state = Arc::new(AppState::in_memory(Settings::default()));
        let indexer = Arc::new(
            Indexer::new(store.clone(), gateway.clone(), state, IndexerConfig::default()).await,
        );
        let related = RelatedNotes::new(indexer.clone(), store.clone(), gateway);
        (related, store, indexer)
    }

    #[tokio::test]
    async fn test_find_explains_similar_notes() {
        let (related, store, indexer) = setup().await;
        store.insert("garden.md", "garden plans").await;
        store.insert("tomato.md", "tomato garden").await;
        store.insert("mute.md", "garden tomato mute").await;
        store.insert("tax.md", "tax return").await;
        indexer
            .rebuild_all(|_| {}, &tokio_util::sync::CancellationToken::new())
            .await
            .unwrap();

        let found = related.find("garden.md").await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.note_id.as_str()).collect();
        // Equal similarity, so ordered by identifier.
        assert_eq!(ids, vec!["mute.md", "tomato.md"]);
        assert_eq!(found[0].explanation, None);
        assert_eq!(
            found[1].explanation.as_deref(),
            Some("Both are about gardening.")
        );
        assert!(found[1].similarity > 0.5);
    }

    #[tokio::test]
    async fn test_find_skips_deleted_notes() {
        let (related, store, indexer) = setup().await;
        store.insert("garden.md", "garden plans").await;
        store.insert("tomato.md", "tomato garden").await;
        indexer
            .rebuild_all(|_| {}, &tokio_util::sync::CancellationToken::new())
            .await
            .unwrap();

        store.remove("tomato.md").await;
        assert!(related.find("garden.md").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_rejects_unknown_notes() {
        let (related, _store, _indexer) = setup().await;
        assert!(matches!(related.find(" ").await, Err(VaultError::AbsentNote)));
        assert!(matches!(
            related.find("missing.md").await,
            Err(VaultError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_append_section_replaces_previous() {
        let (related, store, _indexer) = setup().await;
        store
            .insert(
                "garden.md",
                "# Garden\n\nPlans.\n\n## Related notes\n\n- [[old]]\n\n## Log\n\nWatered.",
            )
            .await;

        let notes = vec![
            RelatedNote {
                note_id: "crops/tomato.md".to_string(),
                similarity: 0.9,
                explanation: Some("Same bed.".to_string()),
            },
            RelatedNote {
                note_id: "soil.md".to_string(),
                similarity: 0.6,
                explanation: None,
            },
        ];
        related.append_section("garden.md", &notes).await.unwrap();

        assert_eq!(
            store.read_content("garden.md").await.unwrap(),
            "# Garden\n\nPlans.\n\n## Log\n\nWatered.\n\n## Related notes\n\n- [[crops/tomato]]: Same bed.\n- [[soil]]\n"
        );
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "é".repeat(EXCERPT_CHARS + 10);
        assert_eq!(excerpt(&text).chars().count(), EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }
}
