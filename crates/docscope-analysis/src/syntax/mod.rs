//! Expression model lowered from the C# syntax tree.
//!
//! Analysis never keeps tree-sitter nodes past the file walk. Expressions the
//! later stages care about (collection-name arguments, filters, pipelines,
//! constant initializers) are lowered into [`Expr`], which is serializable so
//! per-file results can be cached and replayed by incremental scans.

pub mod expr;
pub mod lower;
pub mod node;

pub use expr::{Argument, Expr, ObjectMember};
pub use lower::{lower_arguments, lower_expr};
