//! Per-file analysis output.
//!
//! Everything here is serializable: a `FileAnalysis` is what incremental
//! scans persist as a file snapshot and replay for unchanged files.

use docscope_core::model::{
    AttributeConfig, FieldDefinition, LineSpan, NullabilityContext, TypeKind,
};
use serde::{Deserialize, Serialize};

use crate::syntax::{Argument, Expr};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Repository-relative path with `/` separators.
    pub file_path: String,
    pub content_hash: String,
    pub usings: Vec<String>,
    pub types: Vec<DeclaredType>,
    pub symbols: Vec<SymbolDecl>,
    pub call_sites: Vec<CollectionCallSite>,
    pub handles: Vec<HandleDecl>,
    pub operations: Vec<OperationSite>,
    pub error_nodes: usize,
    pub total_nodes: usize,
}

impl FileAnalysis {
    /// The file touches the database API at all.
    pub fn has_database_usage(&self) -> bool {
        !self.call_sites.is_empty() || !self.handles.is_empty()
    }
}

/// A POCO-shaped type declaration, before ids and provenance are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredType {
    pub name: String,
    pub namespace: Option<String>,
    pub kind: TypeKind,
    pub fields: Vec<FieldDefinition>,
    pub attributes: Vec<AttributeConfig>,
    pub base_types: Vec<String>,
    pub nullability: NullabilityContext,
    pub discriminators: Vec<String>,
    pub line_span: LineSpan,
}

impl DeclaredType {
    pub fn full_name(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }
}

pub(crate) fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_string(),
    }
}

/// Lexical position of a site: namespace, enclosing type and member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteScope {
    pub namespace: Option<String>,
    /// Namespace-qualified enclosing type.
    pub enclosing_type: Option<String>,
    pub enclosing_member: Option<String>,
}

impl SiteScope {
    /// `Type.Member`, `Type` or the file-level placeholder.
    pub fn symbol(&self) -> String {
        match (&self.enclosing_type, &self.enclosing_member) {
            (Some(t), Some(m)) => format!("{t}.{m}"),
            (Some(t), None) => t.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => "<file>".to_string(),
        }
    }

    pub fn enclosing_type_name(&self) -> Option<&str> {
        self.enclosing_type
            .as_deref()
            .map(|t| t.rsplit('.').next().unwrap_or(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Const,
    StaticReadonly,
    Readonly,
}

/// A constant or read-only member with its initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDecl {
    /// Namespace-qualified declaring type.
    pub container: String,
    pub name: String,
    pub kind: SymbolKind,
    pub declared_type: String,
    pub initializer: Option<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSiteSource {
    /// `GetCollection<T>(name)`.
    Invocation,
    /// `[BsonCollection("name")]` on the type.
    Attribute,
}

/// A place where a collection handle is obtained for a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCallSite {
    /// Position among the file's call sites; part of the mapping identity.
    pub ordinal: usize,
    /// Generic argument as written, e.g. `Order` or `BsonDocument`.
    pub type_argument: String,
    /// The collection-name expression.
    pub argument: Expr,
    pub source: CallSiteSource,
    /// Variable, field or property the handle is assigned to.
    pub assigned_to: Option<String>,
    pub scope: SiteScope,
    pub line_span: LineSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Field,
    Property,
    Local,
    Parameter,
}

/// A member or variable typed as a collection handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleDecl {
    pub name: String,
    pub type_argument: String,
    pub kind: HandleKind,
    pub scope: SiteScope,
    /// Ordinal of the call site that initializes it, when known.
    pub call_site: Option<usize>,
    pub line: u32,
}

/// What an operation is invoked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Receiver {
    /// A named handle: `_orders`, `this._orders`, `_context.Orders`.
    Handle {
        name: String,
        qualifier: Option<String>,
    },
    /// `db.GetCollection<T>("x").Find(...)`: ordinal of that call site.
    CallSite(usize),
    Unknown(String),
}

/// A call after (or before) the operation in a fluent chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCall {
    pub method: String,
    pub type_args: Vec<String>,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSite {
    /// Driver method as called, e.g. `FindAsync`.
    pub method: String,
    pub receiver: Receiver,
    /// `WithReadPreference(...)` style calls between the handle and the method.
    pub receiver_modifiers: Vec<ChainCall>,
    pub type_args: Vec<String>,
    pub args: Vec<Argument>,
    /// Calls chained after the operation, in order.
    pub chain: Vec<ChainCall>,
    pub is_awaited: bool,
    /// The enclosing member starts or joins a transaction.
    pub in_transaction_scope: bool,
    /// Locals declared earlier in the enclosing member.
    pub locals: Vec<(String, Expr)>,
    /// Position among the member's operations; part of the operation identity.
    pub ordinal: usize,
    pub scope: SiteScope,
    pub line_span: LineSpan,
}
