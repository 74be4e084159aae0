//! Diagnostic logging for the harness
//!
//! Runner internals emit `tracing` events; this installs a stderr subscriber
//! so they never interleave with the report on stdout.

use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives, e.g. `attest_core=debug`.
pub const LOG_ENV: &str = "ATTEST_LOG";

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "warn" };
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
