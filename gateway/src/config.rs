//! Provider configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cloud::CloudProvider;
use crate::local::LocalProvider;
use crate::provider::ModelProvider;

/// Which backend serves completions and embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Hosted API authenticated with a key.
    Cloud,

    /// Self-hosted model server.
    Local,
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::Cloud
    }
}

/// Configuration for the model provider.
///
/// Unset fields fall back to the provider's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which provider to use.
    pub kind: ProviderKind,

    /// API key (cloud only).
    pub api_key: Option<String>,

    /// Endpoint override.
    pub base_url: Option<String>,

    /// Model for completions.
    pub completion_model: Option<String>,

    /// Model for embeddings.
    pub embedding_model: Option<String>,
}

impl ProviderConfig {
    /// Configuration for the cloud provider.
    pub fn cloud(api_key: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Cloud,
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Configuration for a local provider.
    pub fn local() -> Self {
        Self {
            kind: ProviderKind::Local,
            ..Self::default()
        }
    }

    /// Set the endpoint URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the completion model.
    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = Some(model.into());
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Build the provider this configuration selects.
    pub fn build_provider(&self) -> Arc<dyn ModelProvider> {
        match self.kind {
            ProviderKind::Cloud => {
                let mut provider = CloudProvider::new();
                if let Some(ref key) = self.api_key {
                    provider = provider.with_api_key(key.clone());
                }
                if let Some(ref url) = self.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                if let Some(ref model) = self.completion_model {
                    provider = provider.with_completion_model(model.clone());
                }
                if let Some(ref model) = self.embedding_model {
                    provider = provider.with_embedding_model(model.clone());
                }
                Arc::new(provider)
            }
            ProviderKind::Local => {
                let mut provider = LocalProvider::new();
                if let Some(ref url) = self.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                if let Some(ref model) = self.completion_model {
                    provider = provider.with_completion_model(model.clone());
                }
                if let Some(ref model) = self.embedding_model {
                    provider = provider.with_embedding_model(model.clone());
                }
                Arc::new(provider)
            }
        }
    }
}
