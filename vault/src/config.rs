//! Configuration for the indexer.

use serde::{Deserialize, Serialize};

/// Notes embedded concurrently in one batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Number of embedding requests in flight at once during a rebuild.
    pub batch_size: usize,
}

impl IndexerConfig {
    /// Set the batch width.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Batch width, never zero.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
