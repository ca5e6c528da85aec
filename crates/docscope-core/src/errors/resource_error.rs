//! Resource limit errors.

use std::path::PathBuf;

use super::error_code::{self, DocscopeErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("File too large: {path} ({size} bytes, max {max})")]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Too many source files in {repository}: {count} (max {max})")]
    TooManyFiles {
        repository: String,
        count: usize,
        max: usize,
    },

    #[error("Failed to build worker pool: {message}")]
    WorkerPool { message: String },
}

impl DocscopeErrorCode for ResourceError {
    fn error_code(&self) -> &'static str {
        error_code::RESOURCE_EXHAUSTED
    }
}
