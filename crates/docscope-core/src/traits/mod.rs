//! Collaborator traits: cancellation, knowledge store, manual-review queue.

pub mod cancellation;
pub mod knowledge_store;
pub mod review_queue;

pub use cancellation::{Cancellable, CancellationToken};
pub use knowledge_store::{
    merge_outcome, FileSnapshot, KnowledgeStore, RepositoryState, StoredRecord, UpsertOutcome,
    UpsertStats,
};
pub use review_queue::{ReviewItem, ReviewQueue};
