//! Collection-name resolution configuration.

use serde::{Deserialize, Serialize};

/// Tuning for the collection resolver and handle detection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Suffixes stripped from type names before inferring a collection name.
    /// Default: Entity, Model, Document, Record.
    pub poco_suffixes: Vec<String>,
    /// Extra substrings that mark a configuration accessor.
    pub config_markers: Vec<String>,
    /// Extra substrings that mark an environment-variable accessor.
    pub env_markers: Vec<String>,
    /// Extra generic type names treated as collection handles.
    pub handle_types: Vec<String>,
    /// Maximum constant indirection depth. Default: 8.
    pub max_depth: Option<usize>,
}

pub const DEFAULT_POCO_SUFFIXES: &[&str] = &["Entity", "Model", "Document", "Record"];

impl ResolutionConfig {
    pub fn effective_poco_suffixes(&self) -> Vec<String> {
        if self.poco_suffixes.is_empty() {
            DEFAULT_POCO_SUFFIXES.iter().map(|s| s.to_string()).collect()
        } else {
            self.poco_suffixes.clone()
        }
    }

    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.unwrap_or(8)
    }

    pub(crate) fn merge_from(&mut self, other: &ResolutionConfig) {
        merge_fields!(self, other;
            opt: [max_depth];
            vec: [poco_suffixes, config_markers, env_markers, handle_types]);
    }
}
