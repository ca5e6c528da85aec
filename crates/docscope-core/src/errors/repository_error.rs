//! Repository-level errors. The repository is skipped, the run continues.

use super::error_code::{self, DocscopeErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Repository {repository} not found at {path}")]
    NotFound { repository: String, path: String },

    #[error("Repository {repository} has no database usage")]
    NoRelevantUsage { repository: String },

    #[error("Repository {repository} is malformed: {message}")]
    Malformed { repository: String, message: String },

    #[error("Source control error in {repository}: {message}")]
    SourceControl { repository: String, message: String },
}

impl DocscopeErrorCode for RepositoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoRelevantUsage { .. } => error_code::NO_RELEVANT_USAGE,
            _ => error_code::REPOSITORY_ERROR,
        }
    }
}
