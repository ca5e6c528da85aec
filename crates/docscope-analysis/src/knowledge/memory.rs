//! In-memory knowledge store. Same merge semantics as the SQLite store;
//! used by tests and by callers that do not persist.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use docscope_core::errors::StorageError;
use docscope_core::model::{EntityId, EntityType, Fact, KnowledgeBaseEntry};
use docscope_core::traits::{
    merge_outcome, FileSnapshot, KnowledgeStore, RepositoryState, StoredRecord, UpsertOutcome,
    UpsertStats,
};

use super::text::normalize;

#[derive(Default)]
struct Tables {
    records: BTreeMap<(EntityType, EntityId), StoredRecord>,
    states: BTreeMap<String, RepositoryState>,
    snapshots: BTreeMap<(String, String), FileSnapshot>,
}

#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    tables: RwLock<Tables>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned {
            resource: "knowledge store".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned {
            resource: "knowledge store".to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.read().map(|t| t.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KnowledgeStore for InMemoryKnowledgeStore {
    fn upsert_batch(&self, records: &[StoredRecord]) -> Result<UpsertStats, StorageError> {
        let mut tables = self.write()?;
        let mut stats = UpsertStats::default();
        for record in records {
            let key = (record.entry.entity_type, record.entry.entity_id.clone());
            let outcome = merge_outcome(tables.records.get(&key).map(|r| &r.entry), &record.entry);
            if matches!(outcome, UpsertOutcome::Inserted | UpsertOutcome::Updated) {
                tables.records.insert(key, record.clone());
            }
            stats.record(outcome);
        }
        Ok(stats)
    }

    fn get_entry(&self, entity_type: EntityType, id: &EntityId) -> Result<Option<KnowledgeBaseEntry>, StorageError> {
        Ok(self
            .read()?
            .records
            .get(&(entity_type, id.clone()))
            .map(|r| r.entry.clone()))
    }

    fn get_fact(&self, entity_type: EntityType, id: &EntityId) -> Result<Option<Fact>, StorageError> {
        Ok(self
            .read()?
            .records
            .get(&(entity_type, id.clone()))
            .map(|r| r.fact.clone()))
    }

    fn entries_for_repository(&self, repository: &str) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
        Ok(self
            .read()?
            .records
            .values()
            .filter(|r| r.entry.provenance.repository == repository)
            .map(|r| r.entry.clone())
            .collect())
    }

    fn active_facts(&self, repository: &str) -> Result<Vec<Fact>, StorageError> {
        Ok(self
            .read()?
            .records
            .values()
            .filter(|r| r.entry.is_active && r.entry.provenance.repository == repository)
            .map(|r| r.fact.clone())
            .collect())
    }

    fn retire(&self, keys: &[(EntityType, EntityId)], at: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut tables = self.write()?;
        let mut retired = 0;
        for key in keys {
            if let Some(record) = tables.records.get_mut(key) {
                if record.entry.is_active {
                    record.entry.is_active = false;
                    record.entry.last_updated = record.entry.last_updated.max(at);
                    retired += 1;
                }
            }
        }
        Ok(retired)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
        let terms = normalize([query]);
        let terms: Vec<&str> = terms.split(' ').filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.read()?;
        let mut hits: Vec<&KnowledgeBaseEntry> = tables
            .records
            .values()
            .map(|r| &r.entry)
            .filter(|e| e.is_active)
            .filter(|e| {
                let words: Vec<&str> = e.searchable_text.split(' ').collect();
                terms.iter().all(|t| words.contains(t))
            })
            .collect();
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then_with(|| a.entity_id.cmp(&b.entity_id)));
        Ok(hits.into_iter().take(limit).cloned().collect())
    }

    fn repository_state(&self, repository: &str) -> Result<Option<RepositoryState>, StorageError> {
        Ok(self.read()?.states.get(repository).cloned())
    }

    fn save_repository_state(&self, state: &RepositoryState) -> Result<(), StorageError> {
        self.write()?
            .states
            .insert(state.repository.clone(), state.clone());
        Ok(())
    }

    fn file_snapshots(&self, repository: &str) -> Result<Vec<FileSnapshot>, StorageError> {
        Ok(self
            .read()?
            .snapshots
            .values()
            .filter(|s| s.repository == repository)
            .cloned()
            .collect())
    }

    fn save_file_snapshots(&self, snapshots: &[FileSnapshot]) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        for snapshot in snapshots {
            tables.snapshots.insert(
                (snapshot.repository.clone(), snapshot.file_path.clone()),
                snapshot.clone(),
            );
        }
        Ok(())
    }

    fn remove_file_snapshots(&self, repository: &str, file_paths: &[String]) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        for path in file_paths {
            tables.snapshots.remove(&(repository.to_string(), path.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBaseWriter;
    use chrono::Duration;
    use docscope_core::config::StorageConfig;
    use docscope_core::model::{CollectionMapping, EntityRef, LineSpan, ResolutionMethod, SourceRevision};

    fn fact(collection: &str) -> Fact {
        let revision = SourceRevision {
            repository: "shop".into(),
            commit_id: "c1".into(),
            branch: None,
            tag: None,
            is_clean: true,
            extracted_at: Utc::now(),
            extractor_version: "t".into(),
        };
        Fact::from(CollectionMapping {
            id: EntityId::derive(EntityType::CollectionMapping, "shop", "Ctx.cs", "Customer", ""),
            code_type: Some(EntityRef::new(EntityType::CodeType, EntityId::from_raw("ct-1"))),
            type_name: "Customer".into(),
            collection_name: Some(collection.into()),
            method: ResolutionMethod::Literal,
            confidence: 1.0,
            context: "GetCollection".into(),
            is_primary: true,
            provenance: revision.provenance("Ctx.cs", "Shop.Ctx", LineSpan::new(1, 1)),
        })
    }

    #[test]
    fn upsert_is_idempotent_and_guards_last_updated() {
        let store = InMemoryKnowledgeStore::new();
        let writer = KnowledgeBaseWriter::new(&StorageConfig::default());
        let now = Utc::now();

        let first = store.upsert_batch(&writer.records(vec![fact("customers")], now)).unwrap();
        assert_eq!(first.inserted, 1);
        let again = store.upsert_batch(&writer.records(vec![fact("customers")], now)).unwrap();
        assert_eq!(again.unchanged, 1);

        let older = store
            .upsert_batch(&writer.records(vec![fact("clients")], now - Duration::hours(1)))
            .unwrap();
        assert_eq!(older.stale, 1);
        let newer = store
            .upsert_batch(&writer.records(vec![fact("clients")], now + Duration::hours(1)))
            .unwrap();
        assert_eq!(newer.updated, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn retire_hides_from_search_and_active_facts() {
        let store = InMemoryKnowledgeStore::new();
        let writer = KnowledgeBaseWriter::new(&StorageConfig::default());
        let f = fact("customers");
        let key = (f.entity_type(), f.id().clone());
        store.upsert_batch(&writer.records(vec![f], Utc::now())).unwrap();

        assert_eq!(store.search("Customers", 10).unwrap().len(), 1);
        assert_eq!(store.retire(&[key.clone()], Utc::now()).unwrap(), 1);
        assert_eq!(store.retire(&[key], Utc::now()).unwrap(), 0);
        assert!(store.search("customers", 10).unwrap().is_empty());
        assert!(store.active_facts("shop").unwrap().is_empty());
        assert_eq!(store.entries_for_repository("shop").unwrap().len(), 1);
    }
}
