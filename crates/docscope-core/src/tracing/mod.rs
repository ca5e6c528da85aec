//! Observability for docscope.
//! `tracing` with `EnvFilter`, span field names, and per-run metrics.

pub mod metrics;
pub mod run_metrics;
pub mod setup;

pub use run_metrics::{Counter, RunMetrics, RunReport};
pub use setup::init_tracing;
