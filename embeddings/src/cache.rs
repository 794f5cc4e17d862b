//! Per-note embedding cache.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Version of the persisted cache layout. Snapshots with another version are
/// discarded on load.
pub const SCHEMA_VERSION: &str = "1";

/// The embedding of one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEmbedding {
    /// Stable note identifier (vault-relative path).
    #[serde(rename = "path")]
    pub note_id: String,

    /// The embedding vector.
    #[serde(rename = "embedding")]
    pub vector: Embedding,

    /// Modification time of the note content that was embedded.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

/// Durable form of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Cached entries.
    #[serde(default)]
    pub embeddings: Vec<NoteEmbedding>,

    /// Layout version the snapshot was written with.
    #[serde(default)]
    pub version: String,
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self {
            embeddings: Vec::new(),
            version: SCHEMA_VERSION.to_string(),
        }
    }
}

impl CacheSnapshot {
    /// Serialize the snapshot to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Mapping from note id to its embedding.
///
/// All entries share one dimensionality; a vector of another length is
/// rejected rather than mixed in.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    entries: HashMap<String, NoteEmbedding>,
    schema_version: String,
}

impl EmbeddingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }

    /// Restore a cache from its durable form.
    ///
    /// A snapshot from another schema version, or one whose vectors do not
    /// share a dimensionality, yields an empty cache so the caller rebuilds.
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        let mut cache = Self::new();

        if snapshot.version != SCHEMA_VERSION {
            warn!(
                "Discarding embedding cache with schema version {:?} (expected {SCHEMA_VERSION})",
                snapshot.version
            );
            return cache;
        }

        for entry in snapshot.embeddings {
            let note_id = entry.note_id.clone();
            if let Err(e) = cache.upsert(&note_id, entry.vector, entry.last_modified) {
                warn!("Discarding corrupt embedding cache ({note_id}: {e})");
                return Self::new();
            }
        }

        info!("Loaded {} cached note embeddings", cache.len());
        cache
    }

    /// Durable form of the cache, ordered by note id.
    pub fn snapshot(&self) -> CacheSnapshot {
        let mut embeddings: Vec<NoteEmbedding> = self.entries.values().cloned().collect();
        embeddings.sort_by(|a, b| a.note_id.cmp(&b.note_id));

        CacheSnapshot {
            embeddings,
            version: self.schema_version.clone(),
        }
    }

    /// Get the embedding of a note.
    pub fn get(&self, note_id: &str) -> Option<&NoteEmbedding> {
        self.entries.get(note_id)
    }

    /// Check if a note has an embedding.
    pub fn contains(&self, note_id: &str) -> bool {
        self.entries.contains_key(note_id)
    }

    /// Insert or fully replace the embedding of a note.
    pub fn upsert(
        &mut self,
        note_id: &str,
        vector: Embedding,
        last_modified: DateTime<Utc>,
    ) -> Result<()> {
        if vector.is_empty() {
            return Err(EmbeddingError::EmptyVector);
        }

        // Dimensionality is set by the other entries, so a sole entry can be
        // replaced by a vector of any length.
        if let Some(expected) = self
            .entries
            .values()
            .find(|e| e.note_id != note_id)
            .map(|e| e.vector.len())
        {
            if expected != vector.len() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let entry = NoteEmbedding {
            note_id: note_id.to_string(),
            vector,
            last_modified,
        };
        self.entries.insert(note_id.to_string(), entry);
        debug!("Cached embedding for note: {note_id}");

        Ok(())
    }

    /// Remove the embedding of a note.
    pub fn remove(&mut self, note_id: &str) -> Option<NoteEmbedding> {
        self.entries.remove(note_id)
    }

    /// Remove every entry. The schema version is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Number of cached notes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality of the current generation, if any entry exists.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.values().next().map(|e| e.vector.len())
    }

    /// Schema version of this cache.
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Iterate over all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &NoteEmbedding> {
        self.entries.values()
    }

    /// All cached note ids in arbitrary order.
    pub fn note_ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}
