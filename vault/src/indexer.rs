//! Incremental embedding index over the note collection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use notegraph_embeddings::{EmbeddingCache, SearchOptions, SimilarityResult, search_from_note};
use notegraph_gateway::{Gateway, GatewayError};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::IndexerConfig;
use crate::error::{Result, VaultError};
use crate::state::AppState;
use crate::store::NoteStore;
use crate::watcher::NoteChanged;

/// Where a note stands relative to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    /// No cached embedding.
    Unindexed,

    /// Cached embedding matches the note's content.
    Indexed,

    /// Note changed after its embedding was computed.
    Stale,
}

/// Result for a single note during a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    /// Embedded and cached.
    Indexed,

    /// Blank note, nothing to embed.
    Skipped,

    /// Embedding failed; the note was left out.
    Failed(String),
}

/// Progress of a rebuild, reported once per note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexProgress {
    /// Notes processed so far.
    pub done: usize,

    /// Notes in this rebuild.
    pub total: usize,

    /// Note just processed.
    pub note_id: String,

    /// What happened to it.
    pub outcome: IndexOutcome,
}

/// Result of a rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Notes found in the collection.
    pub total: usize,

    /// Notes embedded and cached.
    pub indexed: usize,

    /// Blank notes.
    pub skipped: usize,

    /// Notes that failed, with the reason.
    pub failed: Vec<(String, String)>,

    /// Whether the rebuild stopped early.
    pub cancelled: bool,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Keeps the embedding cache consistent with the note collection.
///
/// The indexer is the only writer of the cache. Readers get a shared handle
/// through [`Indexer::cache`] and must not hold it across I/O.
pub struct Indexer {
    store: Arc<dyn NoteStore>,
    gateway: Arc<Gateway>,
    state: Arc<AppState>,
    cache: Arc<RwLock<EmbeddingCache>>,
    config: IndexerConfig,
}

impl Indexer {
    /// Create an indexer, restoring the cache persisted in `state`.
    pub async fn new(
        store: Arc<dyn NoteStore>,
        gateway: Arc<Gateway>,
        state: Arc<AppState>,
        config: IndexerConfig,
    ) -> Self {
        let cache = state.load_cache().await;
        Self {
            store,
            gateway,
            state,
            cache: Arc::new(RwLock::new(cache)),
            config,
        }
    }

    /// Shared read handle to the cache.
    pub fn cache(&self) -> Arc<RwLock<EmbeddingCache>> {
        self.cache.clone()
    }

    /// Number of cached notes.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Check if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Determine whether a note needs embedding.
    pub async fn state_of(&self, note_id: &str) -> Result<NoteState> {
        let cached = self
            .cache
            .read()
            .await
            .get(note_id)
            .map(|e| e.last_modified);

        let Some(cached) = cached else {
            return Ok(NoteState::Unindexed);
        };

        let modified = self.store.last_modified(note_id).await?;

        // The cache persists milliseconds; finer precision would make every
        // reloaded entry look stale.
        if modified.timestamp_millis() > cached.timestamp_millis() {
            Ok(NoteState::Stale)
        } else {
            Ok(NoteState::Indexed)
        }
    }

    /// Embed every note from scratch.
    ///
    /// The cache is cleared first. Notes are embedded `batch_size` at a time;
    /// each batch completes before the next starts. A note that fails is
    /// logged and left out, never aborting the rest. The cache is saved after
    /// every batch.
    pub async fn rebuild_all<F>(
        &self,
        mut progress: F,
        cancel: &CancellationToken,
    ) -> Result<RebuildReport>
    where
        F: FnMut(&IndexProgress),
    {
        let start = Instant::now();
        let note_ids = self.store.list_note_ids().await?;
        let total = note_ids.len();
        let batch_size = self.config.effective_batch_size();

        info!("Rebuilding embeddings for {total} notes in batches of {batch_size}");

        self.cache.write().await.clear();

        let mut report = RebuildReport {
            total,
            ..RebuildReport::default()
        };
        let mut done = 0;

        for batch in note_ids.chunks(batch_size) {
            if cancel.is_cancelled() {
                info!("Rebuild cancelled after {done} of {total} notes");
                report.cancelled = true;
                break;
            }

            let results = join_all(batch.iter().map(|id| self.embed_note(id))).await;

            let mut outcomes = Vec::with_capacity(batch.len());
            {
                let mut cache = self.cache.write().await;
                for (note_id, result) in batch.iter().zip(results) {
                    let outcome = match result {
                        Ok(Some((vector, modified))) => {
                            match cache.upsert(note_id, vector, modified) {
                                Ok(()) => IndexOutcome::Indexed,
                                Err(e) => IndexOutcome::Failed(e.to_string()),
                            }
                        }
                        Ok(None) => IndexOutcome::Skipped,
                        Err(e) => IndexOutcome::Failed(e.to_string()),
                    };
                    outcomes.push((note_id, outcome));
                }
            }

            for (note_id, outcome) in outcomes {
                match outcome {
                    IndexOutcome::Indexed => report.indexed += 1,
                    IndexOutcome::Skipped => {
                        debug!("Skipped blank note: {note_id}");
                        report.skipped += 1;
                    }
                    IndexOutcome::Failed(ref reason) => {
                        warn!("Failed to index {note_id}: {reason}");
                        report.failed.push((note_id.clone(), reason.clone()));
                    }
                }

                done += 1;
                progress(&IndexProgress {
                    done,
                    total,
                    note_id: note_id.clone(),
                    outcome,
                });
            }

            self.flush().await?;
        }

        // An empty or immediately cancelled rebuild still persists the clear.
        if done == 0 {
            self.flush().await?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Rebuilt embeddings in {}ms (indexed: {}, skipped: {}, failed: {})",
            report.duration_ms,
            report.indexed,
            report.skipped,
            report.failed.len()
        );

        Ok(report)
    }

    /// Re-embed one note regardless of its state.
    ///
    /// On failure the cache is left unchanged.
    pub async fn reindex_one(&self, note_id: &str) -> Result<()> {
        if note_id.trim().is_empty() {
            return Err(VaultError::AbsentNote);
        }

        let Some((vector, modified)) = self.embed_note(note_id).await? else {
            return Err(GatewayError::EmptyInput.into());
        };

        self.cache.write().await.upsert(note_id, vector, modified)?;
        self.flush().await?;

        debug!("Reindexed note: {note_id}");
        Ok(())
    }

    /// React to a content change, re-embedding only when needed.
    ///
    /// Returns whether the note was re-embedded.
    pub async fn on_note_modified(&self, note_id: &str) -> Result<bool> {
        match self.state_of(note_id).await? {
            NoteState::Indexed => Ok(false),
            NoteState::Unindexed | NoteState::Stale => {
                self.reindex_one(note_id).await?;
                Ok(true)
            }
        }
    }

    /// Process change notifications until the stream ends or `cancel` fires.
    ///
    /// Failures are logged; the loop keeps running.
    pub async fn run_watch_loop(
        &self,
        mut changes: mpsc::Receiver<NoteChanged>,
        cancel: &CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                change = changes.recv() => {
                    let Some(change) = change else {
                        break;
                    };
                    match self.on_note_modified(&change.note_id).await {
                        Ok(true) => info!("Updated embedding for {}", change.note_id),
                        Ok(false) => debug!("Embedding for {} is current", change.note_id),
                        Err(VaultError::Gateway(ref e)) if e.is_input_error() => {
                            debug!("Nothing to embed in {}", change.note_id);
                        }
                        Err(e) => warn!("Could not update {}: {e}", change.note_id),
                    }
                }
            }
        }
        debug!("Watch loop stopped");
    }

    /// Drop cached entries for notes that no longer exist.
    ///
    /// Returns the number of entries removed.
    pub async fn prune_missing(&self) -> Result<usize> {
        let existing: HashSet<String> = self.store.list_note_ids().await?.into_iter().collect();

        let removed = {
            let mut cache = self.cache.write().await;
            let missing: Vec<String> = cache
                .note_ids()
                .into_iter()
                .filter(|id| !existing.contains(*id))
                .map(str::to_string)
                .collect();
            for note_id in &missing {
                cache.remove(note_id);
            }
            missing.len()
        };

        if removed > 0 {
            self.flush().await?;
            info!("Pruned {removed} embeddings of deleted notes");
        }
        Ok(removed)
    }

    /// Notes most similar to a cached note.
    pub async fn search_related(
        &self,
        note_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SimilarityResult>> {
        let cache = self.cache.read().await;
        search_from_note(&cache, note_id, options)
            .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))
    }

    /// Read and embed a note. `None` for a blank note.
    async fn embed_note(&self, note_id: &str) -> Result<Option<(Vec<f32>, DateTime<Utc>)>> {
        // Timestamp first: a write racing the read then shows up as stale.
        let modified = self.store.last_modified(note_id).await?;
        let content = self.store.read_content(note_id).await?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let vector = self.gateway.embed(&content).await?;
        Ok(Some((vector, modified)))
    }

    async fn flush(&self) -> Result<()> {
        let snapshot = self.cache.read().await.snapshot();
        self.state.store_cache(snapshot).await
    }
}
