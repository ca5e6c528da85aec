//! Knowledge-store boundary.
//!
//! Facts and their knowledge-base entries are written together, keyed by
//! (entity type, entity id). Implementations must apply [`merge_outcome`] so
//! that every store agrees on idempotence and the `last_updated` guard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;
use crate::model::{EntityId, EntityType, Fact, KnowledgeBaseEntry};

/// A fact and the entry that indexes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub fact: Fact,
    pub entry: KnowledgeBaseEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same content already stored; nothing written.
    Unchanged,
    /// Incoming `last_updated` is older than the stored one; rejected.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub stale: usize,
}

impl UpsertStats {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Stale => self.stale += 1,
        }
    }

    pub fn merge(&mut self, other: UpsertStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.stale += other.stale;
    }

    /// Records that actually changed the store.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Decide how an incoming entry merges with the stored one.
///
/// Same content on an active entry is a no-op. Otherwise the write is a
/// compare-and-swap on `last_updated`: an older incoming timestamp never
/// overwrites a newer stored one.
pub fn merge_outcome(existing: Option<&KnowledgeBaseEntry>, incoming: &KnowledgeBaseEntry) -> UpsertOutcome {
    match existing {
        None => UpsertOutcome::Inserted,
        Some(stored) if stored.content_hash == incoming.content_hash && stored.is_active == incoming.is_active => {
            UpsertOutcome::Unchanged
        }
        Some(stored) if incoming.last_updated < stored.last_updated => UpsertOutcome::Stale,
        Some(_) => UpsertOutcome::Updated,
    }
}

/// Last completed scan of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub repository: String,
    pub last_commit: String,
    pub branch: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// Cached per-file analysis, keyed by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub repository: String,
    pub file_path: String,
    pub content_hash: String,
    /// Serialized analysis payload.
    pub payload: String,
}

pub trait KnowledgeStore: Send + Sync {
    /// Upsert facts with their entries as one batch.
    fn upsert_batch(&self, records: &[StoredRecord]) -> Result<UpsertStats, StorageError>;

    fn get_entry(&self, entity_type: EntityType, id: &EntityId) -> Result<Option<KnowledgeBaseEntry>, StorageError>;

    fn get_fact(&self, entity_type: EntityType, id: &EntityId) -> Result<Option<Fact>, StorageError>;

    /// All entries of a repository, active and retired.
    fn entries_for_repository(&self, repository: &str) -> Result<Vec<KnowledgeBaseEntry>, StorageError>;

    /// Facts of a repository whose entry is active.
    fn active_facts(&self, repository: &str) -> Result<Vec<Fact>, StorageError>;

    /// Soft-retire entries. Returns how many went from active to inactive.
    fn retire(&self, keys: &[(EntityType, EntityId)], at: DateTime<Utc>) -> Result<usize, StorageError>;

    /// Full-text search over active entries.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeBaseEntry>, StorageError>;

    fn repository_state(&self, repository: &str) -> Result<Option<RepositoryState>, StorageError>;

    fn save_repository_state(&self, state: &RepositoryState) -> Result<(), StorageError>;

    fn file_snapshots(&self, repository: &str) -> Result<Vec<FileSnapshot>, StorageError>;

    fn save_file_snapshots(&self, snapshots: &[FileSnapshot]) -> Result<(), StorageError>;

    fn remove_file_snapshots(&self, repository: &str, file_paths: &[String]) -> Result<(), StorageError>;
}
