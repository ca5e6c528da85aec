//! Repository scanning configuration.

use serde::{Deserialize, Serialize};

/// Configuration for source discovery and per-file analysis.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum file size in bytes. Larger files are skipped. Default: 1 MiB.
    pub max_file_size: Option<u64>,
    /// Maximum files analyzed concurrently. Default: 8.
    pub max_concurrent_files: Option<usize>,
    /// Maximum repositories scanned concurrently. Default: 2.
    pub max_concurrent_repositories: Option<usize>,
    /// Upper bound on source files per repository. Default: 50_000.
    pub max_files_per_repository: Option<usize>,
    /// Share of error nodes above which a file counts as malformed. Default: 0.10.
    pub malformed_error_ratio: Option<f64>,
    /// Ignore patterns added on top of `.gitignore`.
    pub extra_ignore: Vec<String>,
    /// Follow symbolic links during discovery. Default: false.
    pub follow_symlinks: Option<bool>,
    /// Always run a full scan, ignoring prior commit state. Default: false.
    pub force_full_scan: Option<bool>,
}

impl ScanConfig {
    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(1_048_576)
    }

    pub fn effective_max_concurrent_files(&self) -> usize {
        self.max_concurrent_files.unwrap_or(8)
    }

    pub fn effective_max_concurrent_repositories(&self) -> usize {
        self.max_concurrent_repositories.unwrap_or(2)
    }

    pub fn effective_max_files_per_repository(&self) -> usize {
        self.max_files_per_repository.unwrap_or(50_000)
    }

    pub fn effective_malformed_error_ratio(&self) -> f64 {
        self.malformed_error_ratio.unwrap_or(0.10)
    }

    pub fn effective_follow_symlinks(&self) -> bool {
        self.follow_symlinks.unwrap_or(false)
    }

    pub fn effective_force_full_scan(&self) -> bool {
        self.force_full_scan.unwrap_or(false)
    }

    pub(crate) fn merge_from(&mut self, other: &ScanConfig) {
        merge_fields!(self, other;
            opt: [
                max_file_size,
                max_concurrent_files,
                max_concurrent_repositories,
                max_files_per_repository,
                malformed_error_ratio,
                follow_symlinks,
                force_full_scan,
            ];
            vec: [extra_ignore]);
    }
}
