//! Builds knowledge-base entries from facts and writes them in batches.

use chrono::{DateTime, Utc};
use docscope_core::config::StorageConfig;
use docscope_core::errors::StorageError;
use docscope_core::model::{
    CodeType, CollectionMapping, DataRelationship, EntityReference, Fact, KnowledgeBaseEntry,
    ObservedSchema, QueryOperation,
};
use docscope_core::tracing::{Counter, RunMetrics};
use docscope_core::traits::{KnowledgeStore, StoredRecord, UpsertStats};

use super::text::normalize;

/// Attributes worth surfacing as tags.
const NOTABLE_ATTRIBUTES: &[&str] = &[
    "BsonId",
    "BsonIgnoreExtraElements",
    "BsonDiscriminator",
    "BsonKnownTypes",
    "BsonRepresentation",
    "BsonCollection",
    "CollectionName",
    "Collection",
    "BsonIgnore",
    "BsonRequired",
];

pub struct KnowledgeBaseWriter {
    batch_size: usize,
}

impl KnowledgeBaseWriter {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            batch_size: config.effective_batch_size().max(1),
        }
    }

    pub fn entry_for(&self, fact: &Fact, at: DateTime<Utc>) -> KnowledgeBaseEntry {
        let (fragments, tags) = match fact {
            Fact::CodeType(t) => code_type_terms(t),
            Fact::CollectionMapping(m) => mapping_terms(m),
            Fact::QueryOperation(o) => operation_terms(o),
            Fact::DataRelationship(r) => relationship_terms(r),
            Fact::ObservedSchema(s) => schema_terms(s),
        };
        let references = fact
            .references()
            .into_iter()
            .map(|(target, relation)| EntityReference {
                entity_type: target.entity_type,
                entity_id: target.id,
                relation: relation.to_string(),
            })
            .collect();
        KnowledgeBaseEntry {
            entity_type: fact.entity_type(),
            entity_id: fact.id().clone(),
            searchable_text: normalize(fragments.iter().map(String::as_str).chain(tags.iter().map(String::as_str))),
            tags,
            references,
            last_updated: at,
            is_active: true,
            is_indexed: true,
            relevance: relevance(fact),
            content_hash: fact.content_hash(),
            provenance: fact.provenance().clone(),
        }
    }

    pub fn records(&self, facts: Vec<Fact>, at: DateTime<Utc>) -> Vec<StoredRecord> {
        facts
            .into_iter()
            .map(|fact| StoredRecord {
                entry: self.entry_for(&fact, at),
                fact,
            })
            .collect()
    }

    /// Upsert `facts` in batches. A failed batch stops the write; earlier
    /// batches stay committed.
    pub fn write(
        &self,
        store: &dyn KnowledgeStore,
        facts: Vec<Fact>,
        at: DateTime<Utc>,
        metrics: &RunMetrics,
    ) -> Result<UpsertStats, StorageError> {
        let records = self.records(facts, at);
        let mut stats = UpsertStats::default();
        for batch in records.chunks(self.batch_size) {
            let written = store.upsert_batch(batch)?;
            stats.merge(written);
        }
        metrics.add(Counter::EntriesInserted, stats.inserted as u64);
        metrics.add(Counter::EntriesUpdated, stats.updated as u64);
        metrics.add(Counter::EntriesUnchanged, stats.unchanged as u64);
        if stats.stale > 0 {
            tracing::warn!(stale = stats.stale, "stale writes rejected by last_updated guard");
        }
        tracing::debug!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            "knowledge base written"
        );
        Ok(stats)
    }
}

/// Relevance in [0, 1]. Resolution and inference confidences carry over;
/// schemas grow with sample size.
pub fn relevance(fact: &Fact) -> f64 {
    let score = match fact {
        Fact::CodeType(_) => 0.8,
        Fact::CollectionMapping(m) => m.confidence,
        Fact::QueryOperation(o) if !o.filters.is_empty() => 0.8,
        Fact::QueryOperation(_) => 0.7,
        Fact::DataRelationship(r) => r.confidence,
        Fact::ObservedSchema(s) => 0.5 + s.sample_size as f64 / 2000.0,
    };
    score.clamp(0.0, 1.0)
}

type Terms = (Vec<String>, Vec<String>);

fn code_type_terms(t: &CodeType) -> Terms {
    let mut fragments = vec![t.full_name(), t.kind.name().to_string()];
    for f in &t.fields {
        fragments.push(f.name.clone());
        fragments.push(f.element_name.clone());
        fragments.push(f.field_type.clone());
    }
    fragments.extend(t.base_types.iter().cloned());
    fragments.extend(t.discriminators.iter().cloned());

    let mut tags = vec!["code_type".to_string(), t.kind.name().to_string()];
    let attribute_names = t
        .attributes
        .iter()
        .map(|a| a.name.as_str())
        .chain(t.fields.iter().flat_map(|f| f.attributes.iter().map(|a| a.name.as_str())));
    for name in attribute_names {
        let tag = name.to_ascii_lowercase();
        if NOTABLE_ATTRIBUTES.contains(&name) && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if !t.discriminators.is_empty() {
        tags.push("polymorphic".to_string());
    }
    (fragments, tags)
}

fn mapping_terms(m: &CollectionMapping) -> Terms {
    let mut fragments = vec![m.type_name.clone(), m.context.clone()];
    fragments.extend(m.collection_name.iter().cloned());
    let mut tags = vec!["collection_mapping".to_string(), m.method.name().to_string()];
    if m.is_primary {
        tags.push("primary".to_string());
    }
    if m.collection_name.is_none() {
        tags.push("unresolved".to_string());
    }
    (fragments, tags)
}

fn operation_terms(o: &QueryOperation) -> Terms {
    let mut fragments = vec![o.kind.name().to_string(), o.method.clone()];
    fragments.extend(o.collection_name.iter().cloned());
    for expr in o.filters.iter().chain(&o.projections).chain(&o.sorts).chain(&o.updates) {
        fragments.push(expr.path.clone());
    }
    for stage in o.pipeline.iter().flatten() {
        fragments.push(stage.operator.clone());
        fragments.extend(stage.fields.iter().map(|f| f.path.clone()));
        if let Some(lookup) = &stage.lookup {
            fragments.push(lookup.from.clone());
        }
    }

    let mut tags = vec!["query_operation".to_string(), o.kind.name().to_string()];
    if o.pipeline.is_some() {
        tags.push("aggregation".to_string());
    }
    if o.is_transactional {
        tags.push("transactional".to_string());
    }
    if o.is_async {
        tags.push("async".to_string());
    }
    (fragments, tags)
}

fn relationship_terms(r: &DataRelationship) -> Terms {
    let mut fragments = vec![
        r.source_name.clone(),
        r.target_name.clone(),
        r.relationship_type.name().to_string(),
    ];
    fragments.extend(r.field_path.iter().cloned());
    fragments.extend(r.evidence.iter().map(|e| e.evidence_type.name().to_string()));

    let mut tags = vec![
        "data_relationship".to_string(),
        r.relationship_type.name().to_ascii_lowercase(),
    ];
    if r.bidirectional {
        tags.push("bidirectional".to_string());
    }
    (fragments, tags)
}

fn schema_terms(s: &ObservedSchema) -> Terms {
    let mut fragments = vec![s.collection_name.clone()];
    fragments.extend(s.field_types.keys().cloned());
    fragments.extend(s.string_formats.iter().map(|f| f.format.clone()));

    let mut tags = vec!["observed_schema".to_string()];
    if !s.pii_detections.is_empty() {
        tags.push("pii".to_string());
    }
    for detection in &s.pii_detections {
        let tag = format!("pii:{}", detection.pii_type.name());
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if !s.drift.is_empty() {
        tags.push("drift".to_string());
    }
    (fragments, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscope_core::model::{
        EntityId, EntityRef, EntityType, LineSpan, ResolutionMethod, SourceRevision,
    };

    fn mapping() -> CollectionMapping {
        let revision = SourceRevision {
            repository: "shop".into(),
            commit_id: "c1".into(),
            branch: None,
            tag: None,
            is_clean: true,
            extracted_at: Utc::now(),
            extractor_version: "t".into(),
        };
        CollectionMapping {
            id: EntityId::derive(EntityType::CollectionMapping, "shop", "Ctx.cs", "OrderItem", "order_items"),
            code_type: Some(EntityRef::new(
                EntityType::CodeType,
                EntityId::derive(EntityType::CodeType, "shop", "OrderItem.cs", "Shop.OrderItem", ""),
            )),
            type_name: "OrderItem".into(),
            collection_name: Some("order_items".into()),
            method: ResolutionMethod::Constant,
            confidence: 0.9,
            context: "Collections.OrderItems".into(),
            is_primary: true,
            provenance: revision.provenance("Ctx.cs", "Shop.Ctx", LineSpan::new(4, 4)),
        }
    }

    #[test]
    fn entry_carries_text_tags_and_references() {
        let writer = KnowledgeBaseWriter::new(&StorageConfig::default());
        let fact = Fact::from(mapping());
        let entry = writer.entry_for(&fact, Utc::now());

        assert!(entry.searchable_text.contains("orderitem"));
        assert!(entry.searchable_text.contains("order"));
        assert!(entry.searchable_text.contains("items"));
        assert!(entry.tags.contains(&"primary".to_string()));
        assert!(entry.tags.contains(&"constant".to_string()));
        assert_eq!(entry.references.len(), 1);
        assert_eq!(entry.references[0].relation, "maps_type");
        assert!((entry.relevance - 0.9).abs() < 1e-9);
        assert_eq!(entry.content_hash, fact.content_hash());
    }

    #[test]
    fn content_hash_ignores_revision() {
        let a = mapping();
        let mut b = mapping();
        b.provenance.commit_id = "c2".into();
        assert_eq!(Fact::from(a).content_hash(), Fact::from(b).content_hash());
    }
}
