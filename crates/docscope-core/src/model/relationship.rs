//! Inferred relationships between types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityRef, ProvenanceRecord};
use crate::types::collections::SmallVec4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    RefersTo,
    Lookup,
    Embedded,
    Inheritance,
    Composition,
    Aggregation,
}

impl RelationshipType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefersTo => "REFERS_TO",
            Self::Lookup => "LOOKUP",
            Self::Embedded => "EMBEDDED",
            Self::Inheritance => "INHERITANCE",
            Self::Composition => "COMPOSITION",
            Self::Aggregation => "AGGREGATION",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Filter,
    Lookup,
    Embedded,
    NamingConvention,
    Inheritance,
    Attribute,
}

impl EvidenceType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Lookup => "lookup",
            Self::Embedded => "embedded",
            Self::NamingConvention => "naming_convention",
            Self::Inheritance => "inheritance",
            Self::Attribute => "attribute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file_path: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEvidence {
    pub evidence_type: EvidenceType,
    pub description: String,
    pub confidence: f64,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRelationship {
    pub id: EntityId,
    pub source: EntityRef,
    pub source_name: String,
    pub target: EntityRef,
    pub target_name: String,
    pub relationship_type: RelationshipType,
    pub cardinality: Cardinality,
    pub confidence: f64,
    pub field_path: Option<String>,
    pub bidirectional: bool,
    pub evidence: SmallVec4<RelationshipEvidence>,
    pub provenance: ProvenanceRecord,
}
