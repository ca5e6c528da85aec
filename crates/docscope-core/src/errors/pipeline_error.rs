//! Pipeline errors and non-fatal error collection.

use super::error_code::{self, DocscopeErrorCode};
use super::{
    AnalysisError, ConfigError, PiiError, RepositoryError, ResourceError, SamplingError,
    StorageError,
};

/// Errors that can occur during a run.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("PII detection error: {0}")]
    Pii(#[from] PiiError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether this error stops the whole multi-repository run.
    ///
    /// Only configuration failures, live-database connectivity (and sampling
    /// timeouts) and cancellation escalate; everything else is isolated to the
    /// file, field or repository that raised it.
    pub fn aborts_run(&self) -> bool {
        match self {
            Self::Config(_) | Self::Cancelled => true,
            Self::Sampling(e) => e.aborts_run(),
            _ => false,
        }
    }
}

impl DocscopeErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Analysis(e) => e.error_code(),
            Self::Repository(e) => e.error_code(),
            Self::Sampling(e) => e.error_code(),
            Self::Pii(e) => e.error_code(),
            Self::Resource(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Timeout { .. } => error_code::TIMEOUT,
            Self::Cancelled => error_code::CANCELLED,
        }
    }
}

/// Result of a pipeline run that accumulates non-fatal errors.
/// Allows partial results to be returned even when some files fail.
#[derive(Debug, Default)]
pub struct PipelineResult<T: Default = ()> {
    /// The successful result data.
    pub data: T,
    /// Non-fatal errors collected during the run.
    pub errors: Vec<PipelineError>,
}

impl<T: Default> PipelineResult<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<PipelineError>) {
        self.errors.push(error.into());
    }

    /// Returns true if there are no non-fatal errors.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}
