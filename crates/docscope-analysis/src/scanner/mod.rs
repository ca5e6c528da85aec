//! Scanner subsystem: file discovery, content hashing, source control,
//! project defaults and the incremental scan state machine.
//!
//! The scanner is the per-repository entry point of the pipeline. It finds
//! C# sources, reuses persisted per-file analyses where content is unchanged,
//! runs repository-wide extraction and merges the result into the knowledge
//! store.

pub mod extraction;
pub mod hasher;
pub mod ignores;
pub mod incremental;
pub mod project;
pub mod source_control;
pub mod walker;

pub use extraction::{Extraction, Extractor};
pub use incremental::{integrity_violations, IncrementalScanner, ScanOutcome, ScanState, UNVERSIONED};
pub use project::ProjectDefaults;
pub use source_control::{ChangeKind, FileChange, GitSourceControl, HeadInfo, SourceControl};
pub use walker::{discover, DiscoveredFile, Discovery};
