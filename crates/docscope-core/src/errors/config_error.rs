//! Configuration errors. These are the run's validation errors: they are
//! raised before any work starts and abort the run.

use super::error_code::{self, DocscopeErrorCode};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Config validation failed for {field}: {message}")]
    ValidationFailed { field: String, message: String },

    #[error("Invalid config value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl DocscopeErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::VALIDATION_ERROR
    }
}
