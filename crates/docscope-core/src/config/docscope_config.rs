//! Top-level docscope configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{PiiConfig, ResolutionConfig, SamplingConfig, ScanConfig, StorageConfig};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. Explicit overrides (applied via `apply_overrides`)
/// 2. Environment variables (`DOCSCOPE_*`)
/// 3. Project config (`docscope.toml` in project root)
/// 4. User config (`~/.docscope/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocscopeConfig {
    pub scan: ScanConfig,
    pub resolution: ResolutionConfig,
    pub sampling: SamplingConfig,
    pub pii: PiiConfig,
    pub storage: StorageConfig,
}

/// Programmatic overrides, the highest-priority layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_file_size: Option<u64>,
    pub max_concurrent_files: Option<usize>,
    pub max_concurrent_repositories: Option<usize>,
    pub force_full_scan: Option<bool>,
    pub connection_uri: Option<String>,
    pub database: Option<String>,
    pub sample_size: Option<u64>,
    pub database_path: Option<String>,
}

/// Environment variables consulted by [`DocscopeConfig::load`].
pub const ENV_VARS: &[&str] = &[
    "DOCSCOPE_SCAN_MAX_FILE_SIZE",
    "DOCSCOPE_SCAN_MAX_CONCURRENT_FILES",
    "DOCSCOPE_SCAN_MAX_CONCURRENT_REPOSITORIES",
    "DOCSCOPE_SCAN_FORCE_FULL",
    "DOCSCOPE_MONGODB_URI",
    "DOCSCOPE_MONGODB_DATABASE",
    "DOCSCOPE_SAMPLING_SAMPLE_SIZE",
    "DOCSCOPE_SAMPLING_TIMEOUT_MS",
    "DOCSCOPE_PII_REDACT",
    "DOCSCOPE_STORAGE_PATH",
];

impl DocscopeConfig {
    /// Load configuration with layered resolution and validate the result.
    ///
    /// Validation failures abort before any scanning starts.
    pub fn load(root: &Path, overrides: Option<&ConfigOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Layer 4 (lowest priority): user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        // Layer 3: project config
        let project_config_path = root.join("docscope.toml");
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        // Layer 2: environment variables
        Self::apply_env_overrides(&mut config)?;

        // Layer 1 (highest priority): explicit overrides
        if let Some(overrides) = overrides {
            Self::apply_overrides(&mut config, overrides);
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (no layering, no validation).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    pub fn validate(config: &DocscopeConfig) -> Result<(), ConfigError> {
        fn fail(field: &str, message: &str) -> Result<(), ConfigError> {
            Err(ConfigError::ValidationFailed {
                field: field.to_string(),
                message: message.to_string(),
            })
        }
        fn unit_interval(field: &str, value: Option<f64>) -> Result<(), ConfigError> {
            match value {
                Some(v) if !(0.0..=1.0).contains(&v) => fail(field, "must be between 0.0 and 1.0"),
                _ => Ok(()),
            }
        }
        fn positive<T: PartialOrd + Default>(field: &str, value: Option<T>) -> Result<(), ConfigError> {
            match value {
                Some(v) if v <= T::default() => fail(field, "must be greater than 0"),
                _ => Ok(()),
            }
        }

        let scan = &config.scan;
        positive("scan.max_file_size", scan.max_file_size)?;
        positive("scan.max_concurrent_files", scan.max_concurrent_files)?;
        positive("scan.max_concurrent_repositories", scan.max_concurrent_repositories)?;
        positive("scan.max_files_per_repository", scan.max_files_per_repository)?;
        unit_interval("scan.malformed_error_ratio", scan.malformed_error_ratio)?;

        positive("resolution.max_depth", config.resolution.max_depth)?;

        let sampling = &config.sampling;
        positive("sampling.sample_size", sampling.sample_size)?;
        positive("sampling.max_examples", sampling.max_examples)?;
        positive("sampling.enum_min_distinct", sampling.enum_min_distinct)?;
        positive("sampling.max_concurrent_collections", sampling.max_concurrent_collections)?;
        positive("sampling.operation_timeout_ms", sampling.operation_timeout_ms)?;
        positive("sampling.connect_timeout_ms", sampling.connect_timeout_ms)?;
        positive("sampling.max_depth", sampling.max_depth)?;
        if sampling.effective_enum_min_distinct() > sampling.effective_enum_max_distinct() {
            return fail(
                "sampling.enum_min_distinct",
                "must not exceed sampling.enum_max_distinct",
            );
        }
        if sampling.effective_enum_good_candidate_max() > sampling.effective_enum_max_distinct() {
            return fail(
                "sampling.enum_good_candidate_max",
                "must not exceed sampling.enum_max_distinct",
            );
        }
        if let Some(uri) = &sampling.connection_uri {
            if !uri.contains("://") {
                return Err(ConfigError::InvalidValue {
                    field: "sampling.connection_uri".to_string(),
                    message: "expected a mongodb:// or mongodb+srv:// URI".to_string(),
                });
            }
        }

        unit_interval("pii.min_confidence", config.pii.min_confidence)?;

        positive("storage.batch_size", config.storage.batch_size)?;
        positive("storage.read_pool_size", config.storage.read_pool_size)?;
        Ok(())
    }

    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".docscope").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored (forward-compatible).
    fn merge_toml_file(config: &mut DocscopeConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: DocscopeConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins wherever it has a value.
    pub fn merge(base: &mut DocscopeConfig, other: &DocscopeConfig) {
        base.scan.merge_from(&other.scan);
        base.resolution.merge_from(&other.resolution);
        base.sampling.merge_from(&other.sampling);
        base.pii.merge_from(&other.pii);
        base.storage.merge_from(&other.storage);
    }

    /// Apply `DOCSCOPE_*` environment variable overrides.
    ///
    /// A set but unparsable numeric or boolean variable is an error rather
    /// than silently ignored.
    fn apply_env_overrides(config: &mut DocscopeConfig) -> Result<(), ConfigError> {
        fn parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
            match std::env::var(key) {
                Ok(val) => val.trim().parse::<T>().map(Some).map_err(|_| {
                    ConfigError::InvalidValue {
                        field: key.to_string(),
                        message: format!("cannot parse {val:?}"),
                    }
                }),
                Err(_) => Ok(None),
            }
        }

        if let Some(v) = parsed("DOCSCOPE_SCAN_MAX_FILE_SIZE")? {
            config.scan.max_file_size = Some(v);
        }
        if let Some(v) = parsed("DOCSCOPE_SCAN_MAX_CONCURRENT_FILES")? {
            config.scan.max_concurrent_files = Some(v);
        }
        if let Some(v) = parsed("DOCSCOPE_SCAN_MAX_CONCURRENT_REPOSITORIES")? {
            config.scan.max_concurrent_repositories = Some(v);
        }
        if let Some(v) = parsed("DOCSCOPE_SCAN_FORCE_FULL")? {
            config.scan.force_full_scan = Some(v);
        }
        if let Ok(val) = std::env::var("DOCSCOPE_MONGODB_URI") {
            config.sampling.connection_uri = Some(val);
        }
        if let Ok(val) = std::env::var("DOCSCOPE_MONGODB_DATABASE") {
            config.sampling.database = Some(val);
        }
        if let Some(v) = parsed("DOCSCOPE_SAMPLING_SAMPLE_SIZE")? {
            config.sampling.sample_size = Some(v);
        }
        if let Some(v) = parsed("DOCSCOPE_SAMPLING_TIMEOUT_MS")? {
            config.sampling.operation_timeout_ms = Some(v);
        }
        if let Some(v) = parsed("DOCSCOPE_PII_REDACT")? {
            config.pii.redact = Some(v);
        }
        if let Ok(val) = std::env::var("DOCSCOPE_STORAGE_PATH") {
            config.storage.database_path = Some(val);
        }
        Ok(())
    }

    fn apply_overrides(config: &mut DocscopeConfig, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.max_file_size {
            config.scan.max_file_size = Some(v);
        }
        if let Some(v) = overrides.max_concurrent_files {
            config.scan.max_concurrent_files = Some(v);
        }
        if let Some(v) = overrides.max_concurrent_repositories {
            config.scan.max_concurrent_repositories = Some(v);
        }
        if let Some(v) = overrides.force_full_scan {
            config.scan.force_full_scan = Some(v);
        }
        if let Some(ref v) = overrides.connection_uri {
            config.sampling.connection_uri = Some(v.clone());
        }
        if let Some(ref v) = overrides.database {
            config.sampling.database = Some(v.clone());
        }
        if let Some(v) = overrides.sample_size {
            config.sampling.sample_size = Some(v);
        }
        if let Some(ref v) = overrides.database_path {
            config.storage.database_path = Some(v.clone());
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
