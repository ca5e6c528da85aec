//! Declared data types discovered in source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{EntityId, ProvenanceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Record,
    Struct,
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Record => "record",
            Self::Struct => "struct",
        }
    }
}

/// Nullable reference type context in effect for a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullabilityContext {
    Enabled,
    Disabled,
    #[default]
    Unspecified,
}

/// One attribute application, e.g. `[BsonElement("email")]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Attribute name without the `Attribute` suffix.
    pub name: String,
    /// Positional argument source text, string quotes removed.
    pub arguments: Vec<String>,
    pub named_arguments: BTreeMap<String, String>,
}

impl AttributeConfig {
    pub fn first_argument(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Name as stored in documents (`[BsonElement]` override or the member name).
    pub element_name: String,
    /// Declared type as written, e.g. `List<OrderLine>?`.
    pub field_type: String,
    /// Element type for collection-typed members (`OrderLine` for `List<OrderLine>`).
    pub element_type: Option<String>,
    pub is_collection: bool,
    pub nullable: bool,
    pub required: bool,
    pub is_id: bool,
    pub attributes: Vec<AttributeConfig>,
    pub default_value: Option<String>,
}

impl FieldDefinition {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// The type that carries the data: the element type for collections,
    /// otherwise the declared type without nullable markers.
    pub fn value_type(&self) -> &str {
        self.element_type
            .as_deref()
            .unwrap_or_else(|| self.field_type.trim_end_matches('?'))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeType {
    pub id: EntityId,
    pub name: String,
    pub namespace: Option<String>,
    pub kind: TypeKind,
    pub fields: Vec<FieldDefinition>,
    pub attributes: Vec<AttributeConfig>,
    pub base_types: Vec<String>,
    pub nullability: NullabilityContext,
    pub discriminators: Vec<String>,
    pub provenance: ProvenanceRecord,
}

impl CodeType {
    /// Namespace-qualified name.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn id_field(&self) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.is_id)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeConfig> {
        self.attributes.iter().find(|a| a.name == name)
    }
}
