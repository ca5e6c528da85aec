//! File-backed knowledge store: persistence across reopen, full-text
//! search, scan state, snapshots and the PII review queue.

use chrono::{Duration, Utc};
use docscope_core::config::StorageConfig;
use docscope_core::model::{
    CollectionMapping, DetectionMethod, EntityId, EntityRef, EntityReference, EntityType, Fact,
    KnowledgeBaseEntry, LineSpan, PiiCategory, PiiDetection, ResolutionMethod, SourceRevision,
};
use docscope_core::traits::{FileSnapshot, RepositoryState, ReviewItem, StoredRecord};
use docscope_core::{KnowledgeStore, ReviewQueue};
use docscope_storage::connection::pragmas::verify_wal_mode;
use docscope_storage::migrations::{current_version, latest_version, run_migrations};
use docscope_storage::queries::entries::fts_query;
use docscope_storage::SqliteKnowledgeStore;

fn revision() -> SourceRevision {
    SourceRevision {
        repository: "shop".into(),
        commit_id: "4f1c2e9".into(),
        branch: Some("main".into()),
        tag: None,
        is_clean: true,
        extracted_at: Utc::now(),
        extractor_version: "docscope/test".into(),
    }
}

fn mapping(type_name: &str, collection: &str, file: &str, relevance: f64) -> StoredRecord {
    let provenance = revision().provenance(file, &format!("Shop.Data.{type_name}Repository"), LineSpan::new(12, 12));
    let type_id = EntityId::derive(EntityType::CodeType, "shop", "Models/x.cs", type_name, "");
    let mapping = CollectionMapping {
        id: EntityId::derive(EntityType::CollectionMapping, "shop", file, type_name, collection),
        code_type: Some(EntityRef::new(EntityType::CodeType, type_id.clone())),
        type_name: format!("Shop.Models.{type_name}"),
        collection_name: Some(collection.into()),
        method: ResolutionMethod::Constant,
        confidence: 0.9,
        context: "GetCollection".into(),
        is_primary: true,
        provenance: provenance.clone(),
    };
    let fact = Fact::from(mapping);
    StoredRecord {
        entry: KnowledgeBaseEntry {
            entity_type: EntityType::CollectionMapping,
            entity_id: fact.id().clone(),
            searchable_text: format!("{} {} collection mapping", type_name.to_lowercase(), collection),
            tags: vec!["collection_mapping".into(), "constant".into()],
            references: vec![EntityReference {
                entity_type: EntityType::CodeType,
                entity_id: type_id,
                relation: "maps_type".into(),
            }],
            last_updated: Utc::now(),
            is_active: true,
            is_indexed: true,
            relevance,
            content_hash: fact.content_hash(),
            provenance,
        },
        fact,
    }
}

#[test]
fn data_survives_reopen_and_migrations_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.db");
    let rec = mapping("Customer", "customers", "Data/CustomerRepository.cs", 0.8);
    {
        let store = SqliteKnowledgeStore::open(&path).unwrap();
        assert_eq!(store.upsert_batch(&[rec.clone()]).unwrap().inserted, 1);
        store.checkpoint().unwrap();
    }

    let store = SqliteKnowledgeStore::open(&path).unwrap();
    let entry = store.get_entry(EntityType::CollectionMapping, &rec.entry.entity_id).unwrap();
    assert_eq!(entry, Some(rec.entry.clone()));
    assert_eq!(store.upsert_batch(&[rec]).unwrap().unchanged, 1);

    store
        .database()
        .with_writer(|conn| {
            assert_eq!(current_version(conn)?, latest_version());
            assert_eq!(run_migrations(conn)?, 0);
            assert!(verify_wal_mode(conn)?);
            Ok(())
        })
        .unwrap();
    store.verify_integrity().unwrap();
}

#[test]
fn search_ranks_by_relevance_and_skips_retired_entries() {
    let store = SqliteKnowledgeStore::open_in_memory().unwrap();
    let customers = mapping("Customer", "customers", "Data/CustomerRepository.cs", 0.4);
    let archive = mapping("Customer", "customer_archive", "Data/ArchiveRepository.cs", 0.9);
    let orders = mapping("Order", "orders", "Data/OrderRepository.cs", 0.7);
    store
        .upsert_batch(&[customers.clone(), archive.clone(), orders])
        .unwrap();

    let hits = store.search("Customer", 10).unwrap();
    let ids: Vec<_> = hits.iter().map(|e| e.entity_id.clone()).collect();
    assert_eq!(ids, vec![archive.entry.entity_id.clone(), customers.entry.entity_id.clone()]);
    assert_eq!(store.search("customer, mapping!", 1).unwrap().len(), 1);
    assert!(store.search("  ", 10).unwrap().is_empty());
    assert!(store.search("invoices", 10).unwrap().is_empty());

    let key = (EntityType::CollectionMapping, archive.entry.entity_id.clone());
    assert_eq!(store.retire(&[key], Utc::now()).unwrap(), 1);
    let hits = store.search("customer", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity_id, customers.entry.entity_id);
    assert_eq!(store.entries_for_repository("shop").unwrap().len(), 3);
    assert_eq!(store.active_facts("shop").unwrap().len(), 2);
}

#[test]
fn reactivated_entries_return_to_the_index() {
    let store = SqliteKnowledgeStore::open_in_memory().unwrap();
    let rec = mapping("Order", "orders", "Data/OrderRepository.cs", 0.5);
    let key = (EntityType::CollectionMapping, rec.entry.entity_id.clone());
    store.upsert_batch(&[rec.clone()]).unwrap();
    store.retire(&[key], Utc::now()).unwrap();
    assert!(store.search("orders", 10).unwrap().is_empty());

    let mut again = rec;
    again.entry.last_updated = Utc::now() + Duration::seconds(1);
    assert_eq!(store.upsert_batch(&[again]).unwrap().updated, 1);
    assert_eq!(store.search("orders", 10).unwrap().len(), 1);
}

#[test]
fn scan_state_and_snapshots_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: Some("state/kb.db".into()),
        read_pool_size: Some(2),
        ..Default::default()
    };
    let store = SqliteKnowledgeStore::from_config(dir.path(), &config).unwrap();
    assert!(dir.path().join("state/kb.db").exists());
    assert!(store.repository_state("shop").unwrap().is_none());

    let state = RepositoryState {
        repository: "shop".into(),
        last_commit: "4f1c2e9".into(),
        branch: Some("main".into()),
        scanned_at: Utc::now(),
    };
    store.save_repository_state(&state).unwrap();
    assert_eq!(store.repository_state("shop").unwrap(), Some(state));

    let snapshot = |path: &str, hash: &str| FileSnapshot {
        repository: "shop".into(),
        file_path: path.into(),
        content_hash: hash.into(),
        payload: "{}".into(),
    };
    store
        .save_file_snapshots(&[snapshot("Models/Order.cs", "a"), snapshot("Models/Customer.cs", "b")])
        .unwrap();
    store.save_file_snapshots(&[snapshot("Models/Order.cs", "c")]).unwrap();
    store
        .remove_file_snapshots("shop", &["Models/Customer.cs".to_string()])
        .unwrap();
    assert_eq!(store.file_snapshots("shop").unwrap(), vec![snapshot("Models/Order.cs", "c")]);
    assert!(store.file_snapshots("other").unwrap().is_empty());
}

#[test]
fn review_queue_persists_pending_items_until_resolved() {
    let store = SqliteKnowledgeStore::open_in_memory().unwrap();
    let queue = store.review_queue();
    let detection = PiiDetection {
        field_path: "contact.phone".into(),
        pii_type: PiiCategory::Phone,
        confidence: 0.55,
        method: DetectionMethod::ValuePattern,
        matched_pattern: "phone".into(),
        sample_count: 20,
        match_count: 11,
        is_redacted: true,
        requires_manual_review: true,
        queued_for_review: true,
    };
    let item = ReviewItem::new("customers", detection, vec!["+1 555 0100".into()]);
    queue.enqueue(item.clone()).unwrap();
    queue.enqueue(item.clone()).unwrap();

    let pending = queue.pending().unwrap();
    assert_eq!(pending, vec![item.clone()]);
    assert!(queue.resolve(&item.id, false).unwrap());
    assert!(queue.pending().unwrap().is_empty());
    assert!(!queue.resolve(&uuid::Uuid::new_v4(), true).unwrap());
}

#[test]
fn fts_queries_quote_every_token() {
    assert_eq!(fts_query("Customer email").as_deref(), Some("\"customer\" \"email\""));
    assert_eq!(fts_query("order-line's").as_deref(), Some("\"order\" \"line\" \"s\""));
    assert_eq!(fts_query("-- *"), None);
}
