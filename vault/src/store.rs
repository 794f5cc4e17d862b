//! Access to the note collection.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, VaultError};

/// File extension of notes.
pub const NOTE_EXTENSION: &str = "md";

/// Read and write access to notes by identifier.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Full text of a note.
    async fn read_content(&self, note_id: &str) -> Result<String>;

    /// Replace the text of a note.
    async fn write_content(&self, note_id: &str, content: &str) -> Result<()>;

    /// Identifiers of every note, sorted.
    async fn list_note_ids(&self) -> Result<Vec<String>>;

    /// When the note's content last changed.
    async fn last_modified(&self, note_id: &str) -> Result<DateTime<Utc>>;
}

/// Notes stored as Markdown files below a root directory.
///
/// A note's identifier is its path relative to the root, with `/`
/// separators. Hidden files and directories are ignored.
pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    /// Open a store rooted at an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(VaultError::DirectoryNotFound(root.display().to_string()));
        }

        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, note_id: &str) -> Result<PathBuf> {
        let relative = Path::new(note_id);
        let safe = !note_id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(VaultError::NoteNotFound(note_id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Map a file below `root` to its note identifier.
///
/// Returns `None` for anything that is not a visible Markdown note.
pub fn note_id_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    if relative.extension().and_then(|e| e.to_str()) != Some(NOTE_EXTENSION) {
        return None;
    }

    let mut parts = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        let part = part.to_str()?;
        if part.starts_with('.') {
            return None;
        }
        parts.push(part);
    }

    Some(parts.join("/"))
}

fn not_found(note_id: &str, error: std::io::Error) -> VaultError {
    if error.kind() == std::io::ErrorKind::NotFound {
        VaultError::NoteNotFound(note_id.to_string())
    } else {
        VaultError::Io(error)
    }
}

#[async_trait]
impl NoteStore for FsNoteStore {
    async fn read_content(&self, note_id: &str) -> Result<String> {
        let path = self.resolve(note_id)?;
        fs::read_to_string(&path)
            .await
            .map_err(|e| not_found(note_id, e))
    }

    async fn write_content(&self, note_id: &str, content: &str) -> Result<()> {
        let path = self.resolve(note_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        debug!("Wrote note: {note_id}");
        Ok(())
    }

    async fn list_note_ids(&self) -> Result<Vec<String>> {
        let root = self.root.clone();

        let ids = tokio::task::spawn_blocking(move || {
            let mut ids: Vec<String> = WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| note_id_for(&root, e.path()))
                .collect();
            ids.sort();
            ids
        })
        .await
        .map_err(std::io::Error::other)?;

        debug!("Listed {} notes", ids.len());
        Ok(ids)
    }

    async fn last_modified(&self, note_id: &str) -> Result<DateTime<Utc>> {
        let path = self.resolve(note_id)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found(note_id, e))?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }
}

/// Notes held in memory, for embedding hosts without a file system and for
/// tests.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<BTreeMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryNoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a note, stamped with the current time.
    pub async fn insert(&self, note_id: impl Into<String>, content: impl Into<String>) {
        self.insert_at(note_id, content, Utc::now()).await;
    }

    /// Add or replace a note with an explicit modification time.
    pub async fn insert_at(
        &self,
        note_id: impl Into<String>,
        content: impl Into<String>,
        modified: DateTime<Utc>,
    ) {
        self.notes
            .write()
            .await
            .insert(note_id.into(), (content.into(), modified));
    }

    /// Remove a note.
    pub async fn remove(&self, note_id: &str) {
        self.notes.write().await.remove(note_id);
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn read_content(&self, note_id: &str) -> Result<String> {
        self.notes
            .read()
            .await
            .get(note_id)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))
    }

    async fn write_content(&self, note_id: &str, content: &str) -> Result<()> {
        self.insert(note_id, content).await;
        Ok(())
    }

    async fn list_note_ids(&self) -> Result<Vec<String>> {
        Ok(self.notes.read().await.keys().cloned().collect())
    }

    async fn last_modified(&self, note_id: &str) -> Result<DateTime<Utc>> {
        self.notes
            .read()
            .await
            .get(note_id)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lists_visible_markdown_notes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("projects")).unwrap();
        std::fs::create_dir_all(root.join(".obsidian")).unwrap();
        std::fs::write(root.join("inbox.md"), "inbox").unwrap();
        std::fs::write(root.join("projects/garden.md"), "garden").unwrap();
        std::fs::write(root.join("projects/photo.png"), "png").unwrap();
        std::fs::write(root.join(".obsidian/workspace.md"), "hidden").unwrap();

        let store = FsNoteStore::new(root).unwrap();
        let ids = store.list_note_ids().await.unwrap();

        assert_eq!(ids, vec!["inbox.md", "projects/garden.md"]);
        assert_eq!(
            store.read_content("projects/garden.md").await.unwrap(),
            "garden"
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsNoteStore::new(temp_dir.path()).unwrap();

        store.write_content("daily/today.md", "# Today").await.unwrap();
        assert_eq!(store.read_content("daily/today.md").await.unwrap(), "# Today");
        assert!(store.last_modified("daily/today.md").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_escaping_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsNoteStore::new(temp_dir.path()).unwrap();

        assert!(matches!(
            store.read_content("nope.md").await,
            Err(VaultError::NoteNotFound(_))
        ));
        assert!(matches!(
            store.read_content("../outside.md").await,
            Err(VaultError::NoteNotFound(_))
        ));
        assert!(matches!(
            FsNoteStore::new(temp_dir.path().join("missing")),
            Err(VaultError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_note_id_for() {
        let root = Path::new("/vault");
        assert_eq!(
            note_id_for(root, Path::new("/vault/a/b.md")),
            Some("a/b.md".to_string())
        );
        assert_eq!(note_id_for(root, Path::new("/vault/a/b.txt")), None);
        assert_eq!(note_id_for(root, Path::new("/vault/.trash/b.md")), None);
        assert_eq!(note_id_for(root, Path::new("/elsewhere/b.md")), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryNoteStore::new();
        store.insert("b.md", "two").await;
        store.insert("a.md", "one").await;

        assert_eq!(store.list_note_ids().await.unwrap(), vec!["a.md", "b.md"]);
        store.remove("a.md").await;
        assert!(matches!(
            store.last_modified("a.md").await,
            Err(VaultError::NoteNotFound(_))
        ));
    }
}
