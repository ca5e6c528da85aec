//! Knowledge-store errors.

use super::error_code::{self, DocscopeErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("serialization error for {entity}: {message}")]
    Serialization { entity: String, message: String },

    #[error("lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("integrity violation: {details}")]
    IntegrityViolation { details: String },
}

impl DocscopeErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            Self::IntegrityViolation { .. } => error_code::INTEGRITY_VIOLATION,
            _ => error_code::STORAGE_ERROR,
        }
    }
}
