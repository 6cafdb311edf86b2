//! Tracing subscriber initialization.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `log_level` sets the default `EnvFilter` directive (overridable via
/// `RUST_LOG`); `console` selects a human-readable formatter instead of
/// JSON, matching `LOG_TO_CONSOLE`/`--console`.
pub fn init(log_level: &str, console: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if console {
        subscriber.init();
    } else {
        subscriber.json().init();
    }
}
