//! Type-to-collection mappings produced by the collection resolver.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityRef, ProvenanceRecord};

/// How a collection name was obtained, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Literal,
    Constant,
    Config,
    Environment,
    Inferred,
    Unknown,
}

impl ResolutionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Constant => "constant",
            Self::Config => "config",
            Self::Environment => "environment",
            Self::Inferred => "inferred",
            Self::Unknown => "unknown",
        }
    }

    /// Literal and constant resolutions are exact.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Literal | Self::Constant)
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMapping {
    pub id: EntityId,
    /// Mapped code type; `None` for untyped (`BsonDocument`) handles.
    pub code_type: Option<EntityRef>,
    pub type_name: String,
    /// Resolved collection name; `None` when only context is known.
    pub collection_name: Option<String>,
    pub method: ResolutionMethod,
    pub confidence: f64,
    pub context: String,
    pub is_primary: bool,
    pub provenance: ProvenanceRecord,
}
