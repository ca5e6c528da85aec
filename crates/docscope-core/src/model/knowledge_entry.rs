//! Searchable knowledge-base entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, EntityType, ProvenanceRecord};

/// Weak, typed edge from an entry to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    /// Edge label, e.g. `maps_type` or `target`.
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseEntry {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub searchable_text: String,
    pub tags: Vec<String>,
    pub references: Vec<EntityReference>,
    pub last_updated: DateTime<Utc>,
    pub is_active: bool,
    pub is_indexed: bool,
    pub relevance: f64,
    /// Hash of the fact content, excluding per-run provenance fields.
    pub content_hash: String,
    pub provenance: ProvenanceRecord,
}

impl KnowledgeBaseEntry {
    /// Store key: (entity type, entity id).
    pub fn key(&self) -> (EntityType, &EntityId) {
        (self.entity_type, &self.entity_id)
    }
}
