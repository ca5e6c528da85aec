//! DocscopeErrorCode trait and the stable error code table.

/// Every error enum implements this to expose a stable, machine-readable
/// code alongside its human-readable message.
pub trait DocscopeErrorCode {
    /// Returns the error code string (e.g., "ANALYSIS_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted error string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const ANALYSIS_ERROR: &str = "ANALYSIS_ERROR";
pub const REPOSITORY_ERROR: &str = "REPOSITORY_ERROR";
pub const NO_RELEVANT_USAGE: &str = "NO_RELEVANT_USAGE";
pub const DB_CONNECTIVITY: &str = "DB_CONNECTIVITY";
pub const SAMPLING_ERROR: &str = "SAMPLING_ERROR";
pub const PII_DETECTION_ERROR: &str = "PII_DETECTION_ERROR";
pub const TIMEOUT: &str = "TIMEOUT";
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const INTEGRITY_VIOLATION: &str = "INTEGRITY_VIOLATION";
pub const CANCELLED: &str = "CANCELLED";
