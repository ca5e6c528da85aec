//! docscope-analysis: the extraction engine.
//!
//! Turns C# repositories into provenance-tracked facts about MongoDB data
//! access. Per file, [`source::SourceAnalyzer`] parses with tree-sitter and
//! records declarations, constants, collection call sites and driver
//! operations. Per repository, the resolver, operation extractor and
//! relationship inferencer run over the merged corpus, and the incremental
//! scanner merges the result into a [`docscope_core::KnowledgeStore`].
//! Live collections are sampled read-only, with PII redacted before any
//! observed value is stored.

pub mod knowledge;
pub mod operations;
pub mod parsers;
pub mod pii;
pub mod relationships;
pub mod resolver;
pub mod run;
pub mod sampling;
pub mod scanner;
pub mod semantic;
pub mod source;
pub mod syntax;

pub use knowledge::{InMemoryKnowledgeStore, KnowledgeBaseWriter};
pub use run::{RepositoryTarget, RunCoordinator, RunSummary, Sampling};
pub use scanner::{GitSourceControl, IncrementalScanner, ScanOutcome, ScanState};
pub use source::{FileAnalysis, SourceAnalyzer};
