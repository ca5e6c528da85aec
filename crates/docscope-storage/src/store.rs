//! SQLite-backed [`KnowledgeStore`].

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docscope_core::config::StorageConfig;
use docscope_core::errors::StorageError;
use docscope_core::model::{EntityId, EntityType, Fact, KnowledgeBaseEntry};
use docscope_core::traits::{
    merge_outcome, FileSnapshot, KnowledgeStore, RepositoryState, StoredRecord, UpsertOutcome,
    UpsertStats,
};

use crate::connection::pool::ReadPool;
use crate::connection::DatabaseManager;
use crate::queries::{entries, facts, maintenance, scan_state};
use crate::review_queue::SqliteReviewQueue;

pub struct SqliteKnowledgeStore {
    db: Arc<DatabaseManager>,
}

impl SqliteKnowledgeStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with_readers(path, ReadPool::default_size())
    }

    pub fn open_with_readers(path: &Path, read_pool_size: usize) -> Result<Self, StorageError> {
        Ok(Self {
            db: Arc::new(DatabaseManager::open(path, read_pool_size)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            db: Arc::new(DatabaseManager::open_in_memory()?),
        })
    }

    /// Open the database configured for a project rooted at `root`,
    /// creating its parent directory if needed.
    pub fn from_config(root: &Path, config: &StorageConfig) -> Result<Self, StorageError> {
        let path = root.join(config.effective_database_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::SqliteError {
                message: format!("create {}: {e}", parent.display()),
            })?;
        }
        Self::open_with_readers(&path, config.effective_read_pool_size())
    }

    /// Review queue sharing this store's database.
    pub fn review_queue(&self) -> SqliteReviewQueue {
        SqliteReviewQueue::new(Arc::clone(&self.db))
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.db.checkpoint()
    }

    /// SQLite integrity check plus a scan for entries without provenance.
    pub fn verify_integrity(&self) -> Result<(), StorageError> {
        self.db.with_reader(|conn| {
            if !maintenance::integrity_check(conn)? {
                return Err(StorageError::IntegrityViolation {
                    details: "PRAGMA integrity_check failed".to_string(),
                });
            }
            match maintenance::orphaned_entries(conn)? {
                0 => Ok(()),
                n => Err(StorageError::IntegrityViolation {
                    details: format!("{n} entries without provenance"),
                }),
            }
        })
    }

    pub fn active_count(&self, repository: &str) -> Result<usize, StorageError> {
        self.db.with_reader(|conn| entries::count_active(conn, repository))
    }
}

impl KnowledgeStore for SqliteKnowledgeStore {
    fn upsert_batch(&self, records: &[StoredRecord]) -> Result<UpsertStats, StorageError> {
        if records.is_empty() {
            return Ok(UpsertStats::default());
        }
        let stats = self.db.with_transaction(|conn| {
            let mut stats = UpsertStats::default();
            for record in records {
                let entry = &record.entry;
                let existing = entries::get_entry(conn, entry.entity_type, &entry.entity_id)?;
                let outcome = merge_outcome(existing.as_ref(), entry);
                if matches!(outcome, UpsertOutcome::Inserted | UpsertOutcome::Updated) {
                    facts::upsert_fact(conn, &record.fact)?;
                    entries::upsert_entry(conn, entry)?;
                }
                stats.record(outcome);
            }
            Ok(stats)
        })?;
        tracing::debug!(
            records = records.len(),
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            stale = stats.stale,
            "upserted batch"
        );
        Ok(stats)
    }

    fn get_entry(&self, entity_type: EntityType, id: &EntityId) -> Result<Option<KnowledgeBaseEntry>, StorageError> {
        self.db.with_reader(|conn| entries::get_entry(conn, entity_type, id))
    }

    fn get_fact(&self, entity_type: EntityType, id: &EntityId) -> Result<Option<Fact>, StorageError> {
        self.db.with_reader(|conn| facts::get_fact(conn, entity_type, id))
    }

    fn entries_for_repository(&self, repository: &str) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
        self.db.with_reader(|conn| entries::entries_for_repository(conn, repository))
    }

    fn active_facts(&self, repository: &str) -> Result<Vec<Fact>, StorageError> {
        self.db.with_reader(|conn| facts::active_facts(conn, repository))
    }

    fn retire(&self, keys: &[(EntityType, EntityId)], at: DateTime<Utc>) -> Result<usize, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.db.with_transaction(|conn| {
            let mut retired = 0;
            for (entity_type, id) in keys {
                if entries::retire_entry(conn, *entity_type, id, &at)? {
                    retired += 1;
                }
            }
            Ok(retired)
        })
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
        self.db.with_reader(|conn| entries::search(conn, query, limit))
    }

    fn repository_state(&self, repository: &str) -> Result<Option<RepositoryState>, StorageError> {
        self.db.with_reader(|conn| scan_state::get_repository_state(conn, repository))
    }

    fn save_repository_state(&self, state: &RepositoryState) -> Result<(), StorageError> {
        self.db.with_writer(|conn| scan_state::save_repository_state(conn, state))
    }

    fn file_snapshots(&self, repository: &str) -> Result<Vec<FileSnapshot>, StorageError> {
        self.db.with_reader(|conn| scan_state::file_snapshots(conn, repository))
    }

    fn save_file_snapshots(&self, snapshots: &[FileSnapshot]) -> Result<(), StorageError> {
        if snapshots.is_empty() {
            return Ok(());
        }
        self.db.with_transaction(|conn| {
            snapshots
                .iter()
                .try_for_each(|s| scan_state::upsert_file_snapshot(conn, s))
        })
    }

    fn remove_file_snapshots(&self, repository: &str, file_paths: &[String]) -> Result<(), StorageError> {
        if file_paths.is_empty() {
            return Ok(());
        }
        self.db.with_transaction(|conn| {
            for path in file_paths {
                scan_state::delete_file_snapshot(conn, repository, path)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscope_core::model::{CodeType, LineSpan, NullabilityContext, SourceRevision, TypeKind};

    fn record(name: &str, hash: &str, at: DateTime<Utc>) -> StoredRecord {
        let revision = SourceRevision {
            repository: "shop".into(),
            commit_id: "c1".into(),
            branch: Some("main".into()),
            tag: None,
            is_clean: true,
            extracted_at: at,
            extractor_version: "docscope/test".into(),
        };
        let provenance = revision.provenance("Models/Order.cs", &format!("Shop.{name}"), LineSpan::new(3, 9));
        let id = EntityId::derive(EntityType::CodeType, "shop", "Models/Order.cs", name, "");
        let fact = Fact::from(CodeType {
            id: id.clone(),
            name: name.to_string(),
            namespace: Some("Shop".into()),
            kind: TypeKind::Class,
            fields: Vec::new(),
            attributes: Vec::new(),
            base_types: Vec::new(),
            nullability: NullabilityContext::Enabled,
            discriminators: Vec::new(),
            provenance: provenance.clone(),
        });
        StoredRecord {
            fact,
            entry: KnowledgeBaseEntry {
                entity_type: EntityType::CodeType,
                entity_id: id,
                searchable_text: format!("{} shop order", name.to_lowercase()),
                tags: vec!["code_type".into()],
                references: Vec::new(),
                last_updated: at,
                is_active: true,
                is_indexed: true,
                relevance: 0.5,
                content_hash: hash.to_string(),
                provenance,
            },
        }
    }

    #[test]
    fn entries_round_trip_through_sqlite() {
        let store = SqliteKnowledgeStore::open_in_memory().unwrap();
        let rec = record("Order", "h1", Utc::now());
        store.upsert_batch(std::slice::from_ref(&rec)).unwrap();

        let entry = store.get_entry(EntityType::CodeType, &rec.entry.entity_id).unwrap();
        assert_eq!(entry, Some(rec.entry.clone()));
        let fact = store.get_fact(EntityType::CodeType, &rec.entry.entity_id).unwrap();
        assert_eq!(fact, Some(rec.fact.clone()));
        assert_eq!(store.active_facts("shop").unwrap(), vec![rec.fact]);
    }

    #[test]
    fn merge_rules_match_the_in_memory_store() {
        let store = SqliteKnowledgeStore::open_in_memory().unwrap();
        let now = Utc::now();
        let first = store.upsert_batch(&[record("Order", "h1", now)]).unwrap();
        assert_eq!(first.inserted, 1);
        let same = store.upsert_batch(&[record("Order", "h1", now)]).unwrap();
        assert_eq!(same.unchanged, 1);
        let older = store
            .upsert_batch(&[record("Order", "h2", now - chrono::Duration::minutes(5))])
            .unwrap();
        assert_eq!(older.stale, 1);
        let newer = store
            .upsert_batch(&[record("Order", "h2", now + chrono::Duration::minutes(5))])
            .unwrap();
        assert_eq!(newer.updated, 1);

        let id = EntityId::derive(EntityType::CodeType, "shop", "Models/Order.cs", "Order", "");
        let stored = store.get_entry(EntityType::CodeType, &id).unwrap().unwrap();
        assert_eq!(stored.content_hash, "h2");
    }

    #[test]
    fn retire_never_moves_last_updated_backwards() {
        let store = SqliteKnowledgeStore::open_in_memory().unwrap();
        let now = Utc::now();
        let rec = record("Order", "h1", now);
        let key = (EntityType::CodeType, rec.entry.entity_id.clone());
        store.upsert_batch(&[rec]).unwrap();

        let earlier = now - chrono::Duration::hours(1);
        assert_eq!(store.retire(&[key.clone()], earlier).unwrap(), 1);
        assert_eq!(store.retire(&[key.clone()], now).unwrap(), 0);
        let entry = store.get_entry(key.0, &key.1).unwrap().unwrap();
        assert!(!entry.is_active);
        assert_eq!(entry.last_updated, now);
        assert!(store.active_facts("shop").unwrap().is_empty());
        assert_eq!(store.active_count("shop").unwrap(), 0);
    }

    #[test]
    fn empty_batches_touch_nothing() {
        let store = SqliteKnowledgeStore::open_in_memory().unwrap();
        assert_eq!(store.upsert_batch(&[]).unwrap(), UpsertStats::default());
        assert_eq!(store.retire(&[], Utc::now()).unwrap(), 0);
        store.save_file_snapshots(&[]).unwrap();
        store.remove_file_snapshots("shop", &[]).unwrap();
        store.verify_integrity().unwrap();
    }
}
