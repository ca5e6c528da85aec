//! C# parser.

use std::cell::RefCell;
use std::path::Path;

use docscope_core::errors::AnalysisError;
use tree_sitter::{Parser, Tree};

use super::error_tolerant::{count_errors, ErrorStats};

thread_local! {
    /// One parser per worker thread. `Parser` is not `Sync`, and building one
    /// per file would reload the grammar each time.
    static PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

/// A parsed file and its error-node statistics.
pub struct ParsedSource {
    pub tree: Tree,
    pub errors: ErrorStats,
}

fn new_parser() -> Result<Parser, AnalysisError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| AnalysisError::GrammarUnavailable {
            message: e.to_string(),
        })?;
    Ok(parser)
}

/// Parse C# source on the calling thread's parser.
pub fn parse_csharp(source: &str, path: &Path) -> Result<ParsedSource, AnalysisError> {
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let mut parser = match slot.take() {
            Some(parser) => parser,
            None => new_parser()?,
        };
        let tree = parser.parse(source, None);
        *slot = Some(parser);

        let tree = tree.ok_or_else(|| AnalysisError::ParseFailed {
            path: path.to_path_buf(),
            message: "parser produced no tree".to_string(),
        })?;
        let errors = count_errors(tree.root_node());
        Ok(ParsedSource { tree, errors })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_source_without_errors() {
        let parsed = parse_csharp(
            "namespace Shop { public class Order { public string Id { get; set; } } }",
            Path::new("Order.cs"),
        )
        .unwrap();
        assert_eq!(parsed.errors.error_nodes, 0);
        assert!(parsed.errors.total_nodes > 5);
    }

    #[test]
    fn broken_source_reports_error_nodes() {
        let parsed = parse_csharp("public class { ;;; = => }}}", Path::new("Broken.cs")).unwrap();
        assert!(parsed.errors.error_nodes > 0);
    }
}
