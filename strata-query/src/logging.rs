//! Logging infrastructure for Strata.
//!
//! Structured logging controlled by environment variables.
//!
//! # Environment Variables
//!
//! - `STRATA_DEBUG=true` or `STRATA_DEBUG=1` - Enable debug logging
//! - `STRATA_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_query::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Within Strata the standard tracing macros are used:
//!
//! ```rust,ignore
//! debug!(level = 2, partitions = 3, "Dispatching level");
//! warn!(relationship = %name, error = %e, "Batch failed");
//! ```

use std::env;
use std::sync::Once;

use strata_schema::DebugConfig;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `STRATA_DEBUG`.
///
/// Returns `true` if `STRATA_DEBUG` is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("STRATA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn normalize_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

fn normalize_format(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "pretty" => "pretty",
        "compact" => "compact",
        _ => "json",
    }
}

/// Get the configured log level from `STRATA_LOG_LEVEL`.
///
/// Defaults to "debug" if `STRATA_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    env::var("STRATA_LOG_LEVEL")
        .ok()
        .and_then(|level| normalize_level(&level))
        .unwrap_or(fallback)
}

/// Get the configured log format from `STRATA_LOG_FORMAT`.
///
/// Defaults to "json" for structured logging.
pub fn get_log_format() -> &'static str {
    env::var("STRATA_LOG_FORMAT")
        .map(|f| normalize_format(&f))
        .unwrap_or("json")
}

/// Initialize the Strata logging system from the environment.
///
/// Subsequent calls are no-ops. Without `STRATA_DEBUG` or `STRATA_LOG_LEVEL`
/// nothing is installed, leaving room for an application subscriber.
pub fn init() {
    if !is_debug_enabled() && env::var("STRATA_LOG_LEVEL").is_err() {
        return;
    }
    install(get_log_level(), get_log_format());
}

/// Initialize logging from the `[debug]` section of `strata.toml`.
///
/// Environment variables still win over the file.
pub fn init_from_config(config: &DebugConfig) {
    let level = env::var("STRATA_LOG_LEVEL")
        .ok()
        .and_then(|level| normalize_level(&level))
        .or_else(|| normalize_level(&config.log_level))
        .unwrap_or("warn");
    let format = env::var("STRATA_LOG_FORMAT")
        .map(|f| normalize_format(&f))
        .unwrap_or_else(|_| normalize_format(&config.log_format));
    install(level, format);
}

#[allow(unused_variables)]
fn install(level: &'static str, format: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "strata={},strata_query={},strata_schema={},strata_sqlite={}",
                level, level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match format {
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

            tracing::info!(level = level, format = format, "Strata logging initialized");
        }
    });
}

/// Macro for conditional debug logging.
///
/// Only logs if `STRATA_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! strata_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
