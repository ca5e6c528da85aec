//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the docscope tracing/logging system.
///
/// Reads `DOCSCOPE_LOG` for per-subsystem log levels, e.g.
/// `DOCSCOPE_LOG=docscope_analysis::sampling=debug,docscope_storage=warn`.
/// Falls back to `docscope=info` when unset or invalid.
///
/// Idempotent: calling it more than once is a no-op.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("DOCSCOPE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("docscope=info"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
