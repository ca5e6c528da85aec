//! Semantic model: maps identifier and member-access paths to declared
//! symbols so constant indirection can be followed across files, and type
//! names to the repository's code types.

pub mod symbol_table;
pub mod type_index;

pub use symbol_table::SymbolTable;
pub use type_index::TypeIndex;

use crate::source::{SiteScope, SymbolDecl};

/// Symbol lookup as the resolver needs it.
pub trait SemanticModel: Send + Sync {
    /// Resolve `path` (`["Name"]`, `["Constants", "Orders"]`,
    /// `["this", "_name"]`) as seen from `scope`.
    fn resolve_symbol(&self, path: &[&str], scope: &SiteScope) -> Option<&SymbolDecl>;
}
