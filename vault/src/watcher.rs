//! Note change notifications from the file system.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{Result, VaultError};
use crate::store::note_id_for;

/// A note whose content changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteChanged {
    /// Identifier of the note.
    pub note_id: String,

    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

impl NoteChanged {
    /// Create a change notification stamped now.
    pub fn new(note_id: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Watches a vault directory and reports changed notes.
///
/// Deletions are not reported; cached embeddings of deleted notes are left
/// for an explicit prune or rebuild.
pub struct NoteWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    event_tx: mpsc::Sender<NoteChanged>,
}

impl NoteWatcher {
    /// Create a watcher for `root` and the receiving end of its stream.
    pub fn new(root: impl AsRef<Path>) -> Result<(Self, mpsc::Receiver<NoteChanged>)> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(VaultError::DirectoryNotFound(root.display().to_string()));
        }

        let (event_tx, event_rx) = mpsc::channel(1000);
        let watcher = Self {
            root: root.canonicalize()?,
            watcher: None,
            event_tx,
        };
        Ok((watcher, event_rx))
    }

    /// Start delivering change notifications.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let event_tx = self.event_tx.clone();
        let root = self.root.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_content_change(&event.kind) {
                        return;
                    }
                    for path in &event.paths {
                        if let Some(note_id) = note_id_for(&root, path) {
                            debug!("Note changed: {note_id}");
                            if let Err(e) = event_tx.blocking_send(NoteChanged::new(note_id)) {
                                error!("Failed to send note change: {e}");
                            }
                        }
                    }
                }
                Err(e) => error!("Watch error: {e}"),
            },
        )?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);
        info!("Watching notes in {}", self.root.display());

        Ok(())
    }

    /// Stop delivering notifications.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.root);
            info!("Stopped watching {}", self.root.display());
        }
    }

    /// Check if the watcher is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;

    #[test]
    fn test_content_change_kinds() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            NoteWatcher::new(temp_dir.path().join("missing")),
            Err(VaultError::DirectoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, _rx) = NoteWatcher::new(temp_dir.path()).unwrap();

        watcher.start().unwrap();
        assert!(watcher.is_running());
        watcher.stop();
        assert!(!watcher.is_running());
    }
}
