//! Structured span field names shared across subsystems.

/// Repository name being scanned.
pub const REPOSITORY: &str = "repository";

/// Repository-relative file path.
pub const FILE: &str = "file";

/// Collection being sampled.
pub const COLLECTION: &str = "collection";

/// Scan mode: `full`, `incremental` or `no_changes`.
pub const SCAN_MODE: &str = "scan_mode";

/// Analysis phase duration in milliseconds.
pub const ANALYSIS_DURATION: &str = "analysis_duration";

/// Sampling phase duration in milliseconds.
pub const SAMPLING_DURATION: &str = "sampling_duration";

/// Knowledge-store batch write time in milliseconds.
pub const BATCH_WRITE_TIME: &str = "batch_write_time";

/// Integrity check duration in milliseconds.
pub const INTEGRITY_DURATION: &str = "integrity_duration";
