//! Per-file analysis errors. The file is skipped, the repository continues.

use std::path::PathBuf;

use super::error_code::{self, DocscopeErrorCode};

/// Errors raised while analyzing a single source file.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Malformed source in {path}: {error_nodes} error nodes out of {total_nodes}")]
    Malformed {
        path: PathBuf,
        error_nodes: usize,
        total_nodes: usize,
    },

    #[error("Grammar unavailable: {message}")]
    GrammarUnavailable { message: String },

    #[error("Non UTF-8 source in {path}")]
    InvalidEncoding { path: PathBuf },
}

impl DocscopeErrorCode for AnalysisError {
    fn error_code(&self) -> &'static str {
        error_code::ANALYSIS_ERROR
    }
}
