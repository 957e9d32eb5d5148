//! # Logging
//!
//! Installs the global `tracing` subscriber.

use crate::config::AppConfig;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, else by `LOG_LEVEL`
///
/// Logs go to stderr so stdout stays clean for JSON output.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("azurekv={}", config.log_level.to_lowercase()).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // try_init fails only if a subscriber is already set
    let _ = if config.json_logs() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
