//! Error handling for docscope.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod analysis_error;
pub mod config_error;
pub mod error_code;
pub mod pii_error;
pub mod pipeline_error;
pub mod record;
pub mod repository_error;
pub mod resource_error;
pub mod sampling_error;
pub mod storage_error;

pub use analysis_error::AnalysisError;
pub use config_error::ConfigError;
pub use error_code::DocscopeErrorCode;
pub use pii_error::PiiError;
pub use pipeline_error::{PipelineError, PipelineResult};
pub use record::{redact_connection_string, ErrorRecord};
pub use repository_error::RepositoryError;
pub use resource_error::ResourceError;
pub use sampling_error::SamplingError;
pub use storage_error::StorageError;
