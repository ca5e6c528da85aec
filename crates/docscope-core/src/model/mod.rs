//! Fact model: every entity the extraction pipeline emits.
//!
//! Entities never own each other. Cross references are [`EntityRef`] values
//! (type + id) resolved by lookup in the knowledge store.

pub mod code_type;
pub mod collection_mapping;
pub mod fact;
pub mod ids;
pub mod knowledge_entry;
pub mod observed_schema;
pub mod provenance;
pub mod query_operation;
pub mod relationship;

pub use code_type::{AttributeConfig, CodeType, FieldDefinition, NullabilityContext, TypeKind};
pub use collection_mapping::{CollectionMapping, ResolutionMethod};
pub use fact::Fact;
pub use ids::{EntityId, EntityRef, EntityType};
pub use knowledge_entry::{EntityReference, KnowledgeBaseEntry};
pub use observed_schema::{
    BsonKind, DetectionMethod, EnumCandidate, FieldTypeStats, ObservedSchema, PiiCategory,
    PiiDetection, SamplingSnapshot, SchemaDrift, StringFormat, TypeMismatch,
};
pub use provenance::{LineSpan, ProvenanceRecord, SourceRevision};
pub use query_operation::{FieldExpression, LookupSpec, OperationKind, PipelineStage, QueryOperation};
pub use relationship::{
    Cardinality, DataRelationship, EvidenceType, RelationshipEvidence, RelationshipType,
    SourceLocation,
};
