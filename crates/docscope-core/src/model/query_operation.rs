//! Database operations found at call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityRef, ProvenanceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Find,
    Insert,
    Update,
    Replace,
    Delete,
    Aggregate,
    Count,
    Distinct,
    FindOneAndUpdate,
    FindOneAndReplace,
    FindOneAndDelete,
    BulkWrite,
    Watch,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Aggregate => "aggregate",
            Self::Count => "count",
            Self::Distinct => "distinct",
            Self::FindOneAndUpdate => "find_one_and_update",
            Self::FindOneAndReplace => "find_one_and_replace",
            Self::FindOneAndDelete => "find_one_and_delete",
            Self::BulkWrite => "bulk_write",
            Self::Watch => "watch",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Insert
                | Self::Update
                | Self::Replace
                | Self::Delete
                | Self::FindOneAndUpdate
                | Self::FindOneAndReplace
                | Self::FindOneAndDelete
                | Self::BulkWrite
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One field-level clause: a filter predicate, projection, sort key or update.
///
/// `operator` uses query-language names (`$eq`, `$gt`, `asc`, `include`, `$set`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldExpression {
    pub path: String,
    pub operator: String,
    /// Source text of the compared / assigned value, when there is one.
    pub value: Option<String>,
}

impl FieldExpression {
    pub fn new(path: impl Into<String>, operator: impl Into<String>, value: Option<String>) -> Self {
        Self {
            path: path.into(),
            operator: operator.into(),
            value,
        }
    }
}

/// `$lookup` join parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSpec {
    pub from: String,
    pub local_field: Option<String>,
    pub foreign_field: Option<String>,
    pub as_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    /// Stage operator, e.g. `$match`.
    pub operator: String,
    pub fields: Vec<FieldExpression>,
    pub lookup: Option<LookupSpec>,
}

impl PipelineStage {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            fields: Vec::new(),
            lookup: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOperation {
    pub id: EntityId,
    pub kind: OperationKind,
    /// Driver method as called, e.g. `FindAsync`.
    pub method: String,
    pub collection_mapping: EntityRef,
    pub collection_name: Option<String>,
    pub filters: Vec<FieldExpression>,
    pub projections: Vec<FieldExpression>,
    pub sorts: Vec<FieldExpression>,
    pub updates: Vec<FieldExpression>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub pipeline: Option<Vec<PipelineStage>>,
    pub is_transactional: bool,
    pub read_preference: Option<String>,
    pub write_concern: Option<String>,
    pub is_async: bool,
    pub provenance: ProvenanceRecord,
}

impl QueryOperation {
    pub fn lookups(&self) -> impl Iterator<Item = &LookupSpec> {
        self.pipeline
            .iter()
            .flatten()
            .filter_map(|stage| stage.lookup.as_ref())
    }
}
