//! # Vault
//!
//! Keeps the embedding cache consistent with a note collection and builds
//! the note-level features on top of it.
//!
//! ## Features
//!
//! - **Note Store**: Read, write and enumerate notes behind [`NoteStore`]
//! - **Change Watching**: A stream of modified notes from the file system
//! - **Incremental Indexing**: Full rebuilds in bounded batches and
//!   targeted re-embedding of stale notes
//! - **Related Notes**: Nearest neighbours with one-sentence explanations
//! - **App State**: One settings blob holding configuration and the cache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Vault                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  NoteWatcher ──► NoteChanged ──► Indexer ──► EmbeddingCache     │
//! │                                    │              │             │
//! │  NoteStore ◄───────────────────────┘              ▼             │
//! │      ▲                          AppState ◄── CacheSnapshot      │
//! │      └──── RelatedNotes / NoteActions ──► Gateway               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod indexer;
pub mod related;
pub mod state;
pub mod store;
pub mod watcher;

pub use actions::NoteActions;
pub use config::IndexerConfig;
pub use error::{Result, VaultError};
pub use indexer::{IndexOutcome, IndexProgress, Indexer, NoteState, RebuildReport};
pub use related::{RelatedNote, RelatedNotes};
pub use state::{AppState, Settings};
pub use store::{FsNoteStore, MemoryNoteStore, NoteStore};
pub use watcher::{NoteChanged, NoteWatcher};
