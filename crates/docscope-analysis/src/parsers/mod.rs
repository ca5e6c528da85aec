//! Tree-sitter C# parsing: thread_local parser instances and error-node accounting.

pub mod csharp;
pub mod error_tolerant;

pub use csharp::{parse_csharp, ParsedSource};
pub use error_tolerant::{count_errors, is_in_error, ErrorStats};
