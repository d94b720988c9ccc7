/// Tracing subscriber setup
///
/// The engine only emits `tracing` events; embedding applications decide where they go.
/// `init_tracing` is a convenience for binaries and tests that want readable output.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `config.filter`
///
/// Safe to call more than once: later calls are ignored once a global subscriber exists.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_level(true)
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Tracing initialized with filter '{}'", config.filter);
    }
}
