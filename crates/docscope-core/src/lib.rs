//! docscope-core: the foundation crate for the docscope extraction engine.
//!
//! Holds the fact model (provenance, code types, collection mappings, query
//! operations, relationships, observed schemas, knowledge-base entries),
//! the error taxonomy, layered configuration, tracing setup, per-run metrics
//! and the collaborator traits implemented by the storage layer.

pub mod config;
pub mod errors;
pub mod model;
pub mod traits;
pub mod tracing;
pub mod types;

pub use errors::{DocscopeErrorCode, ErrorRecord, PipelineError, PipelineResult};
pub use model::{EntityId, EntityType, Fact, ProvenanceRecord};
pub use traits::{Cancellable, CancellationToken, KnowledgeStore, ReviewQueue};

/// Version stamped into every provenance record produced by this build.
pub const EXTRACTOR_VERSION: &str = concat!("docscope/", env!("CARGO_PKG_VERSION"));
