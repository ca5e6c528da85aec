//! PII detection errors. The field's detection is skipped, sampling continues.

use super::error_code::{self, DocscopeErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum PiiError {
    #[error("PII rule {rule} failed on {field}: {message}")]
    RuleFailed {
        rule: String,
        field: String,
        message: String,
    },

    #[error("Review queue rejected {field}: {message}")]
    ReviewQueueFailed { field: String, message: String },
}

impl DocscopeErrorCode for PiiError {
    fn error_code(&self) -> &'static str {
        error_code::PII_DETECTION_ERROR
    }
}
