//! Knowledge-store configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path, relative to the project root.
    /// Default: `.docscope/knowledge.db`.
    pub database_path: Option<String>,
    /// Records written per transaction. Default: 500.
    pub batch_size: Option<usize>,
    /// Read connections in the pool. Default: 4.
    pub read_pool_size: Option<usize>,
}

impl StorageConfig {
    pub fn effective_database_path(&self) -> String {
        self.database_path
            .clone()
            .unwrap_or_else(|| ".docscope/knowledge.db".to_string())
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(500)
    }

    pub fn effective_read_pool_size(&self) -> usize {
        self.read_pool_size.unwrap_or(4)
    }

    pub(crate) fn merge_from(&mut self, other: &StorageConfig) {
        merge_fields!(self, other;
            opt: [database_path, batch_size, read_pool_size];
            vec: []);
    }
}
