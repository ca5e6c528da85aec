//! Tests for the fact model: ids, content hashing, merge decisions, redaction.

use chrono::{Duration, Utc};
use docscope_core::errors::redact_connection_string;
use docscope_core::model::{
    CodeType, EntityId, EntityType, Fact, KnowledgeBaseEntry, LineSpan, NullabilityContext,
    SourceRevision, TypeKind,
};
use docscope_core::traits::{merge_outcome, UpsertOutcome};
use proptest::prelude::*;

fn revision(commit: &str) -> SourceRevision {
    SourceRevision {
        repository: "shop".into(),
        commit_id: commit.into(),
        branch: Some("main".into()),
        tag: None,
        is_clean: true,
        extracted_at: Utc::now(),
        extractor_version: docscope_core::EXTRACTOR_VERSION.into(),
    }
}

fn order_type(commit: &str) -> CodeType {
    CodeType {
        id: EntityId::derive(EntityType::CodeType, "shop", "Models/Order.cs", "Shop.Order", ""),
        name: "Order".into(),
        namespace: Some("Shop".into()),
        kind: TypeKind::Class,
        fields: Vec::new(),
        attributes: Vec::new(),
        base_types: Vec::new(),
        nullability: NullabilityContext::Enabled,
        discriminators: Vec::new(),
        provenance: revision(commit).provenance("Models/Order.cs", "Shop.Order", LineSpan::new(4, 20)),
    }
}

fn entry_for(fact: &Fact, at: chrono::DateTime<Utc>) -> KnowledgeBaseEntry {
    KnowledgeBaseEntry {
        entity_type: fact.entity_type(),
        entity_id: fact.id().clone(),
        searchable_text: "order shop".into(),
        tags: vec!["code-type".into()],
        references: Vec::new(),
        last_updated: at,
        is_active: true,
        is_indexed: true,
        relevance: 1.0,
        content_hash: fact.content_hash(),
        provenance: fact.provenance().clone(),
    }
}

/// The same fact seen at a later commit hashes identically.
#[test]
fn test_content_hash_ignores_revision() {
    let a = Fact::from(order_type("c1"));
    let b = Fact::from(order_type("c2"));
    assert_eq!(a.content_hash(), b.content_hash());

    let mut changed = order_type("c2");
    changed.name = "PurchaseOrder".into();
    assert_ne!(a.content_hash(), Fact::from(changed).content_hash());
}

/// Identical content is a no-op; older timestamps never win.
#[test]
fn test_merge_outcome_guards_last_updated() {
    let fact = Fact::from(order_type("c1"));
    let now = Utc::now();
    let stored = entry_for(&fact, now);

    assert_eq!(merge_outcome(None, &stored), UpsertOutcome::Inserted);
    assert_eq!(
        merge_outcome(Some(&stored), &entry_for(&fact, now + Duration::seconds(5))),
        UpsertOutcome::Unchanged
    );

    let mut changed = entry_for(&fact, now - Duration::seconds(5));
    changed.content_hash = "different".into();
    assert_eq!(merge_outcome(Some(&stored), &changed), UpsertOutcome::Stale);

    changed.last_updated = now + Duration::seconds(5);
    assert_eq!(merge_outcome(Some(&stored), &changed), UpsertOutcome::Updated);

    let mut retired = stored.clone();
    retired.is_active = false;
    assert_eq!(
        merge_outcome(Some(&retired), &entry_for(&fact, now + Duration::seconds(1))),
        UpsertOutcome::Updated,
        "re-emitting a retired fact reactivates it"
    );
}

proptest! {
    /// Redaction never leaks the password component.
    #[test]
    fn prop_redaction_drops_credentials(
        user in "[a-z]{1,8}",
        password in "[A-Za-z0-9]{6,16}",
        host in "[a-z]{3,10}",
        port in 1024u16..65535,
        db in "[a-z]{1,8}",
    ) {
        let uri = format!("mongodb://{user}:{password}@{host}:{port}/{db}?authSource=admin");
        let redacted = redact_connection_string(&uri);
        let needle = format!(":{password}@");
        prop_assert!(!redacted.contains(&needle));
        prop_assert_eq!(redacted, format!("mongodb://{host}:{port}/{db}"));
    }

    /// Ids depend only on the identity key.
    #[test]
    fn prop_entity_ids_are_stable(file in "[A-Za-z/]{1,30}", symbol in "[A-Za-z.]{1,30}") {
        let a = EntityId::derive(EntityType::QueryOperation, "repo", &file, &symbol, "find#0");
        let b = EntityId::derive(EntityType::QueryOperation, "repo", &file, &symbol, "find#0");
        let c = EntityId::derive(EntityType::QueryOperation, "repo", &file, &symbol, "find#1");
        prop_assert_eq!(&a, &b);
        prop_assert_ne!(a, c);
    }
}
