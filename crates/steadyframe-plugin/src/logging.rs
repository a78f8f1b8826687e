//! Log output for hosts that do not install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "STEADYFRAME_LOG";

/// Install a formatted subscriber filtered by `STEADYFRAME_LOG`, falling
/// back to `default_directives` (e.g. `"info"`). Returns false when a global
/// subscriber was already installed; calling this more than once is harmless.
pub fn init(default_directives: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directives))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
