//! Configuration system for docscope.
//! TOML-based, layered resolution: overrides > env > project > user > defaults.

/// Copy every `Some` / non-empty field of `$other` into `$base`.
macro_rules! merge_fields {
    ($base:expr, $other:expr; opt: [$($opt:ident),* $(,)?]; vec: [$($vec:ident),* $(,)?]) => {
        $(
            if $other.$opt.is_some() {
                $base.$opt = $other.$opt.clone();
            }
        )*
        $(
            if !$other.$vec.is_empty() {
                $base.$vec = $other.$vec.clone();
            }
        )*
    };
}
pub(crate) use merge_fields;

pub mod docscope_config;
pub mod pii_config;
pub mod resolution_config;
pub mod sampling_config;
pub mod scan_config;
pub mod storage_config;

pub use docscope_config::{ConfigOverrides, DocscopeConfig};
pub use pii_config::PiiConfig;
pub use resolution_config::ResolutionConfig;
pub use sampling_config::SamplingConfig;
pub use scan_config::ScanConfig;
pub use storage_config::StorageConfig;
