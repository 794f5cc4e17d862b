//! # Embeddings
//!
//! This crate holds the per-note embedding cache and the similarity search
//! that powers "related notes".
//!
//! ## Features
//!
//! - **Embedding Cache**: One vector per note, tagged with the note's
//!   modification time and guarded by a schema version
//! - **Similarity Search**: Ranked cosine-similarity lookups with a
//!   threshold and top-k cutoff
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  NoteEmbedding ──► EmbeddingCache ──► CacheSnapshot (durable)  │
//! │                          │                                      │
//! │                          ▼                                      │
//! │           query vector ──► search ──► SimilarityResult          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod similarity;

pub use cache::{CacheSnapshot, EmbeddingCache, NoteEmbedding, SCHEMA_VERSION};
pub use error::{EmbeddingError, Result};
pub use similarity::{SearchOptions, SimilarityResult, cosine_similarity, search, search_from_note};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
