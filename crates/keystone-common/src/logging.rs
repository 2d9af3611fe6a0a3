//! Tracing subscriber setup shared by binaries and test harnesses.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging based on log level.
///
/// `RUST_LOG` takes precedence over `level`; an unparsable level falls back
/// to `info`. Calling this more than once is harmless.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized
}
