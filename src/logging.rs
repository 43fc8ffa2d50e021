//! Tracing subscriber setup for embedding applications and tools.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the filter directive, e.g. `codetrail=debug`.
pub const LOG_ENV: &str = "CODETRAIL_LOG";

const DEFAULT_FILTER: &str = "info";

/// Installs a stderr fmt subscriber filtered by `CODETRAIL_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal case for a host application that configures its own.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .is_ok()
}
