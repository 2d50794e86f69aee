//! Logging bootstrap.
//!
//! Structured logging controlled by environment variables:
//!
//! - `STOREHOUSE_DEBUG=true|1|yes` - Enable debug logging
//! - `STOREHOUSE_LOG_LEVEL=debug|info|warn|error|trace` - Set a specific level
//! - `STOREHOUSE_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! The subscriber is only installed with the `tracing-subscriber` feature;
//! otherwise events go to whatever subscriber the application set up.
//!
//! ```rust,no_run
//! use storehouse_aggregate::logging;
//!
//! logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `STOREHOUSE_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("STOREHOUSE_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the log level from `STOREHOUSE_LOG_LEVEL`.
///
/// Falls back to "debug" when `STOREHOUSE_DEBUG` is on, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };

    env::var("STOREHOUSE_LOG_LEVEL")
        .ok()
        .and_then(|level| parse_level(&level))
        .unwrap_or(fallback)
}

/// Get the log format from `STOREHOUSE_LOG_FORMAT`. Defaults to "json".
pub fn get_log_format() -> &'static str {
    env::var("STOREHOUSE_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Initialize logging from the environment. Subsequent calls are no-ops.
///
/// Nothing is installed unless `STOREHOUSE_DEBUG` or `STOREHOUSE_LOG_LEVEL`
/// is set.
pub fn init() {
    if !is_debug_enabled() && env::var("STOREHOUSE_LOG_LEVEL").is_err() {
        return;
    }
    install(get_log_level());
}

/// Initialize logging at `level`, ignoring `STOREHOUSE_LOG_LEVEL`.
///
/// Unknown levels fall back to "warn". Subsequent calls are no-ops.
pub fn init_with_level(level: &str) {
    install(parse_level(level).unwrap_or("warn"));
}

/// Initialize debug logging. Subsequent calls are no-ops.
pub fn init_debug() {
    install("debug");
}

#[cfg_attr(not(feature = "tracing-subscriber"), allow(unused_variables))]
fn install(level: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "storehouse={},storehouse_aggregate={},storehouse_mongodb={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(
                level = level,
                format = get_log_format(),
                "Storehouse logging initialized"
            );
        }
    });
}
