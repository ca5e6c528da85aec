//! Live-database sampling configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the read-only document sampler.
///
/// `connection_uri` may carry credentials. It is only ever logged through
/// `redact_connection_string`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SamplingConfig {
    /// Enable live sampling. Default: true when a document source is supplied.
    pub enabled: Option<bool>,
    /// Read-only connection string.
    pub connection_uri: Option<String>,
    /// Database to sample.
    pub database: Option<String>,
    /// Hard cap on documents sampled per collection. Default: 1000.
    pub sample_size: Option<u64>,
    /// Example values kept per field. Default: 10.
    pub max_examples: Option<usize>,
    /// Fewest distinct values that make an enum candidate. Default: 2.
    pub enum_min_distinct: Option<usize>,
    /// Most distinct values that still make an enum candidate. Default: 20.
    pub enum_max_distinct: Option<usize>,
    /// Distinct-value ceiling for a "good" enum candidate. Default: 10.
    pub enum_good_candidate_max: Option<usize>,
    /// Collections sampled concurrently. Default: 4.
    pub max_concurrent_collections: Option<usize>,
    /// Per-collection operation timeout in milliseconds. Default: 30_000.
    pub operation_timeout_ms: Option<u64>,
    /// Connection timeout in milliseconds. Default: 10_000.
    pub connect_timeout_ms: Option<u64>,
    /// Maximum nesting depth flattened into dot paths. Default: 16.
    pub max_depth: Option<usize>,
}

impl SamplingConfig {
    pub fn effective_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn effective_sample_size(&self) -> u64 {
        self.sample_size.unwrap_or(1000)
    }

    pub fn effective_max_examples(&self) -> usize {
        self.max_examples.unwrap_or(10)
    }

    pub fn effective_enum_min_distinct(&self) -> usize {
        self.enum_min_distinct.unwrap_or(2)
    }

    pub fn effective_enum_max_distinct(&self) -> usize {
        self.enum_max_distinct.unwrap_or(20)
    }

    pub fn effective_enum_good_candidate_max(&self) -> usize {
        self.enum_good_candidate_max.unwrap_or(10)
    }

    pub fn effective_max_concurrent_collections(&self) -> usize {
        self.max_concurrent_collections.unwrap_or(4)
    }

    pub fn effective_operation_timeout_ms(&self) -> u64 {
        self.operation_timeout_ms.unwrap_or(30_000)
    }

    pub fn effective_connect_timeout_ms(&self) -> u64 {
        self.connect_timeout_ms.unwrap_or(10_000)
    }

    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.unwrap_or(16)
    }

    pub(crate) fn merge_from(&mut self, other: &SamplingConfig) {
        merge_fields!(self, other;
            opt: [
                enabled,
                connection_uri,
                database,
                sample_size,
                max_examples,
                enum_min_distinct,
                enum_max_distinct,
                enum_good_candidate_max,
                max_concurrent_collections,
                operation_timeout_ms,
                connect_timeout_ms,
                max_depth,
            ];
            vec: []);
    }
}
