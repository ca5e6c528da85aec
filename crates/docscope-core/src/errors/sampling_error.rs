//! Live-database sampling errors.
//!
//! Endpoints in these errors are always the redacted form produced by
//! [`redact_connection_string`](super::redact_connection_string).

use super::error_code::{self, DocscopeErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("Database connectivity failure at {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    #[error("Sampling {collection} exceeded {timeout_ms}ms")]
    Timeout { collection: String, timeout_ms: u64 },

    #[error("Invalid document in {collection}: {message}")]
    InvalidDocument { collection: String, message: String },

    #[error("Sampling cancelled")]
    Cancelled,
}

impl SamplingError {
    /// Connectivity failures and timeouts abort the whole run.
    pub fn aborts_run(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Timeout { .. })
    }
}

impl DocscopeErrorCode for SamplingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => error_code::DB_CONNECTIVITY,
            Self::Timeout { .. } => error_code::TIMEOUT,
            Self::InvalidDocument { .. } => error_code::SAMPLING_ERROR,
            Self::Cancelled => error_code::CANCELLED,
        }
    }
}
