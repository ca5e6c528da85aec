//! Deterministic entity identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Kind of fact an id refers to. Doubles as the knowledge-entry type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    CodeType,
    CollectionMapping,
    QueryOperation,
    DataRelationship,
    ObservedSchema,
}

impl EntityType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CodeType => "code_type",
            Self::CollectionMapping => "collection_mapping",
            Self::QueryOperation => "query_operation",
            Self::DataRelationship => "data_relationship",
            Self::ObservedSchema => "observed_schema",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::CodeType => "ct",
            Self::CollectionMapping => "cm",
            Self::QueryOperation => "qo",
            Self::DataRelationship => "dr",
            Self::ObservedSchema => "os",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.name() == name)
    }

    pub fn all() -> &'static [EntityType] {
        &[
            Self::CodeType,
            Self::CollectionMapping,
            Self::QueryOperation,
            Self::DataRelationship,
            Self::ObservedSchema,
        ]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable id derived from a fact's identity key.
///
/// The same (type, repository, file, symbol, discriminator) always yields the
/// same id, which is what makes repeated scans idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn derive(
        entity_type: EntityType,
        repository: &str,
        file_path: &str,
        symbol: &str,
        discriminator: &str,
    ) -> Self {
        let key = [entity_type.name(), repository, file_path, symbol, discriminator].join("\u{1f}");
        Self(format!("{}-{:016x}", entity_type.id_prefix(), xxh3_64(key.as_bytes())))
    }

    /// Wrap an id read back from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weak reference to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: EntityId) -> Self {
        Self { entity_type, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic_and_typed() {
        let a = EntityId::derive(EntityType::CodeType, "shop", "Models/Order.cs", "Shop.Order", "");
        let b = EntityId::derive(EntityType::CodeType, "shop", "Models/Order.cs", "Shop.Order", "");
        let c = EntityId::derive(EntityType::CollectionMapping, "shop", "Models/Order.cs", "Shop.Order", "");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("ct-"));
        assert!(c.as_str().starts_with("cm-"));
    }

    #[test]
    fn entity_type_names_round_trip() {
        for t in EntityType::all() {
            assert_eq!(EntityType::from_name(t.name()), Some(*t));
        }
    }
}
