//! Persisted application state.
//!
//! Provider and chat configuration live in one JSON settings blob together
//! with the embedding cache snapshot. Nothing is written implicitly: callers
//! mutate through [`AppState::update`] or [`AppState::store_cache`], both of
//! which save explicitly.

use std::path::{Path, PathBuf};

use notegraph_chat::ChatConfig;
use notegraph_embeddings::{CacheSnapshot, EmbeddingCache};
use notegraph_gateway::ProviderConfig;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::IndexerConfig;
use crate::error::Result;

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model provider selection.
    pub provider: ProviderConfig,

    /// Chat behaviour.
    pub chat: ChatConfig,

    /// Indexing behaviour.
    pub indexer: IndexerConfig,

    /// Embedding cache, stored as top-level `embeddings` and `version`.
    #[serde(flatten)]
    pub cache: CacheSnapshot,
}

/// Explicitly owned settings with optional file persistence.
pub struct AppState {
    path: Option<PathBuf>,
    settings: Mutex<Settings>,
}

impl AppState {
    /// Load settings from `path`, starting from defaults if it does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let settings = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let settings: Settings = serde_json::from_str(&content)?;
            info!(
                "Loaded settings from {} ({} cached embeddings)",
                path.display(),
                settings.cache.embeddings.len()
            );
            settings
        } else {
            info!("No settings at {}, using defaults", path.display());
            Settings::default()
        };

        Ok(Self {
            path: Some(path),
            settings: Mutex::new(settings),
        })
    }

    /// State that is never written to disk.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings: Mutex::new(settings),
        }
    }

    /// Default settings location in the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("notegraph").join("settings.json"))
    }

    /// Where settings are saved, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A copy of the current settings.
    pub async fn settings(&self) -> Settings {
        self.settings.lock().await.clone()
    }

    /// Mutate the settings and save them.
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.settings.lock().await;
        f(&mut *settings);
        self.write(&settings).await
    }

    /// Replace the cache snapshot and save.
    pub async fn store_cache(&self, snapshot: CacheSnapshot) -> Result<()> {
        let mut settings = self.settings.lock().await;
        settings.cache = snapshot;
        self.write(&settings).await
    }

    /// Rebuild the embedding cache from the stored snapshot.
    pub async fn load_cache(&self) -> EmbeddingCache {
        let snapshot = self.settings.lock().await.cache.clone();
        EmbeddingCache::from_snapshot(snapshot)
    }

    /// Save the current settings.
    pub async fn save(&self) -> Result<()> {
        let settings = self.settings.lock().await;
        self.write(&settings).await
    }

    async fn write(&self, settings: &Settings) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Replace atomically: write a sibling file, then rename.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;

        debug!(
            "Saved settings to {} ({} cached embeddings)",
            path.display(),
            settings.cache.embeddings.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notegraph_embeddings::SCHEMA_VERSION;
    use notegraph_gateway::ProviderKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::load(temp_dir.path().join("settings.json"))
            .await
            .unwrap();

        let settings = state.settings().await;
        assert_eq!(settings.provider.kind, ProviderKind::Cloud);
        assert_eq!(settings.indexer.batch_size, 5);
        assert!(state.load_cache().await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_and_settings_share_one_blob() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config/settings.json");

        let state = AppState::load(&path).await.unwrap();
        state
            .update(|s| s.provider = ProviderConfig::local())
            .await
            .unwrap();

        let mut cache = EmbeddingCache::new();
        cache.upsert("a.md", vec![0.5, 0.5], Utc::now()).unwrap();
        state.store_cache(cache.snapshot()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], SCHEMA_VERSION);
        assert_eq!(raw["embeddings"][0]["path"], "a.md");
        assert_eq!(raw["provider"]["kind"], "local");

        let reloaded = AppState::load(&path).await.unwrap();
        assert_eq!(reloaded.settings().await.provider.kind, ProviderKind::Local);
        let cache = reloaded.load_cache().await;
        assert_eq!(cache.get("a.md").unwrap().vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_in_memory_never_writes() {
        let state = AppState::in_memory(Settings::default());
        state.save().await.unwrap();
        assert!(state.path().is_none());
    }
}
