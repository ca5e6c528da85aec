//! Schemas observed by sampling live documents.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, EntityRef, ProvenanceRecord};

/// Value kinds a sampled field can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BsonKind {
    String,
    Integer,
    Number,
    Boolean,
    Datetime,
    Objectid,
    Array,
    Object,
    Null,
}

impl BsonKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Objectid => "objectid",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }

    /// `bsonType` keyword used in the inferred JSON schema.
    pub fn bson_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "long",
            Self::Number => "double",
            Self::Boolean => "bool",
            Self::Datetime => "date",
            Self::Objectid => "objectId",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for BsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-field statistics over one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTypeStats {
    /// Documents in which the path was present.
    pub occurrences: u64,
    /// Type frequency table; values sum to 1.0.
    pub frequencies: BTreeMap<BsonKind, f64>,
    pub primary_type: BsonKind,
    /// Up to the configured number of example values.
    pub examples: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringFormat {
    pub field_path: String,
    /// Format name, e.g. `email`.
    pub format: String,
    pub pattern: String,
    pub frequency: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCandidate {
    pub field_path: String,
    pub values: Vec<String>,
    /// Frequency of each entry in `values`, same order.
    pub frequencies: Vec<f64>,
    pub confidence: f64,
    pub distinct_count: usize,
    pub total_count: u64,
    pub is_good_candidate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Address,
    Name,
    IpAddress,
    Jwt,
    ApiKey,
    Uuid,
}

impl PiiCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
            Self::Address => "address",
            Self::Name => "name",
            Self::IpAddress => "ip_address",
            Self::Jwt => "jwt",
            Self::ApiKey => "api_key",
            Self::Uuid => "uuid",
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    FieldName,
    ValuePattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiDetection {
    pub field_path: String,
    pub pii_type: PiiCategory,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub matched_pattern: String,
    /// String samples inspected.
    pub sample_count: usize,
    /// Samples that matched a value pattern.
    pub match_count: usize,
    pub is_redacted: bool,
    pub requires_manual_review: bool,
    pub queued_for_review: bool,
}

/// Sampling parameters in effect when a schema was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingSnapshot {
    /// Redacted endpoint (`scheme://host:port/db`).
    pub endpoint: String,
    pub database: Option<String>,
    pub strategy: String,
    pub sample_size_limit: u64,
    pub max_examples: usize,
    pub enum_min_distinct: usize,
    pub enum_max_distinct: usize,
    pub enum_good_candidate_max: usize,
    pub sampled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMismatch {
    pub field_path: String,
    pub declared: String,
    pub observed: String,
}

/// Divergence between the mapped code type and observed documents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDrift {
    pub declared_not_observed: Vec<String>,
    pub observed_not_declared: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl SchemaDrift {
    pub fn is_empty(&self) -> bool {
        self.declared_not_observed.is_empty()
            && self.observed_not_declared.is_empty()
            && self.type_mismatches.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedSchema {
    pub id: EntityId,
    pub collection_mapping: EntityRef,
    pub collection_name: String,
    /// JSON-Schema-like document (`bsonType`, `properties`, `required`).
    pub json_schema: serde_json::Value,
    pub field_types: BTreeMap<String, FieldTypeStats>,
    pub required_fields: Vec<String>,
    pub string_formats: Vec<StringFormat>,
    pub enum_candidates: Vec<EnumCandidate>,
    pub sample_size: u64,
    pub pii_redacted: bool,
    pub pii_detections: Vec<PiiDetection>,
    pub snapshot: SamplingSnapshot,
    pub drift: SchemaDrift,
    pub provenance: ProvenanceRecord,
}
