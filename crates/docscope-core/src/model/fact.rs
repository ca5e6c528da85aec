//! Tagged union over the raw fact kinds.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use super::{
    CodeType, CollectionMapping, DataRelationship, EntityId, EntityRef, EntityType,
    ObservedSchema, ProvenanceRecord, QueryOperation,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "fact", rename_all = "snake_case")]
pub enum Fact {
    CodeType(CodeType),
    CollectionMapping(CollectionMapping),
    QueryOperation(QueryOperation),
    DataRelationship(DataRelationship),
    ObservedSchema(ObservedSchema),
}

impl Fact {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::CodeType(_) => EntityType::CodeType,
            Self::CollectionMapping(_) => EntityType::CollectionMapping,
            Self::QueryOperation(_) => EntityType::QueryOperation,
            Self::DataRelationship(_) => EntityType::DataRelationship,
            Self::ObservedSchema(_) => EntityType::ObservedSchema,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::CodeType(f) => &f.id,
            Self::CollectionMapping(f) => &f.id,
            Self::QueryOperation(f) => &f.id,
            Self::DataRelationship(f) => &f.id,
            Self::ObservedSchema(f) => &f.id,
        }
    }

    pub fn provenance(&self) -> &ProvenanceRecord {
        match self {
            Self::CodeType(f) => &f.provenance,
            Self::CollectionMapping(f) => &f.provenance,
            Self::QueryOperation(f) => &f.provenance,
            Self::DataRelationship(f) => &f.provenance,
            Self::ObservedSchema(f) => &f.provenance,
        }
    }

    fn provenance_mut(&mut self) -> &mut ProvenanceRecord {
        match self {
            Self::CodeType(f) => &mut f.provenance,
            Self::CollectionMapping(f) => &mut f.provenance,
            Self::QueryOperation(f) => &mut f.provenance,
            Self::DataRelationship(f) => &mut f.provenance,
            Self::ObservedSchema(f) => &mut f.provenance,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type(), self.id().clone())
    }

    /// Human-readable label used in logs and searchable text.
    pub fn label(&self) -> String {
        match self {
            Self::CodeType(t) => t.full_name(),
            Self::CollectionMapping(m) => format!(
                "{} -> {}",
                m.type_name,
                m.collection_name.as_deref().unwrap_or("?")
            ),
            Self::QueryOperation(o) => format!(
                "{} {}",
                o.kind,
                o.collection_name.as_deref().unwrap_or("?")
            ),
            Self::DataRelationship(r) => format!(
                "{} {} {}",
                r.source_name, r.relationship_type, r.target_name
            ),
            Self::ObservedSchema(s) => s.collection_name.clone(),
        }
    }

    /// Outgoing weak references with their edge labels.
    pub fn references(&self) -> Vec<(EntityRef, &'static str)> {
        match self {
            Self::CodeType(_) => Vec::new(),
            Self::CollectionMapping(m) => m
                .code_type
                .iter()
                .map(|r| (r.clone(), "maps_type"))
                .collect(),
            Self::QueryOperation(o) => vec![(o.collection_mapping.clone(), "targets_collection")],
            Self::DataRelationship(r) => {
                vec![(r.source.clone(), "source"), (r.target.clone(), "target")]
            }
            Self::ObservedSchema(s) => vec![(s.collection_mapping.clone(), "observes_collection")],
        }
    }

    /// Hash of the fact content with per-run provenance fields (commit,
    /// timestamp, branch, tag, clean flag) cleared. Re-extracting an
    /// unchanged fact at a later commit yields the same hash.
    pub fn content_hash(&self) -> String {
        let mut normalized = self.clone();
        let stable = normalized.provenance().without_revision();
        *normalized.provenance_mut() = stable;
        if let Self::ObservedSchema(schema) = &mut normalized {
            schema.snapshot.sampled_at = Default::default();
        }
        let bytes = serde_json::to_vec(&normalized).unwrap_or_default();
        format!("{:016x}", xxh3_64(&bytes))
    }
}

impl From<CodeType> for Fact {
    fn from(v: CodeType) -> Self {
        Self::CodeType(v)
    }
}

impl From<CollectionMapping> for Fact {
    fn from(v: CollectionMapping) -> Self {
        Self::CollectionMapping(v)
    }
}

impl From<QueryOperation> for Fact {
    fn from(v: QueryOperation) -> Self {
        Self::QueryOperation(v)
    }
}

impl From<DataRelationship> for Fact {
    fn from(v: DataRelationship) -> Self {
        Self::DataRelationship(v)
    }
}

impl From<ObservedSchema> for Fact {
    fn from(v: ObservedSchema) -> Self {
        Self::ObservedSchema(v)
    }
}
