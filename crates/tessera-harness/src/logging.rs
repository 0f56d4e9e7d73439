#![forbid(unsafe_code)]

//! Subscriber setup for the harness binary.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted when `--log` is not given.
pub const LOG_ENV: &str = "TESSERA_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Resolve the filter: explicit directive, then `TESSERA_LOG`, then `warn`.
///
/// An unparsable directive falls back to the default rather than failing.
pub fn filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_from_env(LOG_ENV).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install a stderr fmt subscriber. A second call is a no-op.
pub fn init_logging(directive: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directive))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
