//! Similarity computation and ranked search over the cache.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};

/// Default number of results.
pub const DEFAULT_TOP_K: usize = 5;

/// Threshold used by the related-notes flow.
pub const RELATED_MIN_SIMILARITY: f32 = 0.5;

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Vectors of different length and zero-magnitude vectors are errors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// A similarity search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// ID of the matched note.
    pub note_id: String,

    /// Cosine similarity to the query.
    pub similarity: f32,
}

/// Cutoffs applied to a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub k: usize,

    /// Results must score strictly above this.
    pub min_similarity: f32,
}

impl SearchOptions {
    /// Options used when suggesting related notes.
    pub fn related() -> Self {
        Self {
            k: DEFAULT_TOP_K,
            min_similarity: RELATED_MIN_SIMILARITY,
        }
    }

    /// Set the result limit.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the similarity threshold.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_TOP_K,
            min_similarity: 0.0,
        }
    }
}

/// Rank cached notes by similarity to `query`.
///
/// `query_note` is never part of the results. Entries that cannot be compared
/// (other dimensionality, zero magnitude) are skipped. Results are sorted by
/// similarity descending, then note id ascending.
pub fn search(
    cache: &EmbeddingCache,
    query: &[f32],
    query_note: &str,
    options: &SearchOptions,
) -> Vec<SimilarityResult> {
    let mut scores: Vec<(OrderedFloat<f32>, &str)> = Vec::with_capacity(cache.len());

    for entry in cache.iter() {
        if entry.note_id == query_note {
            continue;
        }

        match cosine_similarity(query, &entry.vector) {
            Ok(score) if score > options.min_similarity => {
                scores.push((OrderedFloat(score), entry.note_id.as_str()));
            }
            Ok(_) => {}
            Err(EmbeddingError::ZeroVector) => {
                debug!("Skipping zero-magnitude comparison with {}", entry.note_id);
            }
            Err(e) => warn!("Skipping {} in similarity search: {e}", entry.note_id),
        }
    }

    scores.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    scores
        .into_iter()
        .take(options.k)
        .map(|(score, id)| SimilarityResult {
            note_id: id.to_string(),
            similarity: score.0,
        })
        .collect()
}

/// Rank cached notes by similarity to a note already in the cache.
///
/// Returns `None` when the note has no cached embedding.
pub fn search_from_note(
    cache: &EmbeddingCache,
    note_id: &str,
    options: &SearchOptions,
) -> Option<Vec<SimilarityResult>> {
    let entry = cache.get(note_id)?;
    Some(search(cache, &entry.vector, note_id, options))
}
