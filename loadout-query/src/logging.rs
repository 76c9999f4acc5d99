//! Logging setup for loadout.
//!
//! Structured logging is controlled by the `LOADOUT_DEBUG` environment variable.
//!
//! # Environment Variables
//!
//! - `LOADOUT_DEBUG=true` or `LOADOUT_DEBUG=1` - Enable debug logging
//! - `LOADOUT_LOG_LEVEL=debug|info|warn|error|trace` - Set a specific log level
//! - `LOADOUT_LOG_FORMAT=json|pretty|compact` - Set the output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use loadout_query::logging;
//!
//! // Call once at startup
//! logging::init();
//! ```
//!
//! Inside the engine the standard tracing macros are used:
//!
//! ```rust,ignore
//! debug!(entity = %entity, association = %name, "Preloading association");
//! info!(entity = %entity, count = records.len(), "Loading associations");
//! warn!(entity = %entity, attribute = %name, "Dropping undeclared attribute");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `LOADOUT_DEBUG`.
///
/// Returns `true` if it is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("LOADOUT_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `LOADOUT_LOG_LEVEL`.
///
/// Defaults to "debug" if `LOADOUT_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("LOADOUT_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `LOADOUT_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("LOADOUT_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// Does nothing unless `LOADOUT_DEBUG` or `LOADOUT_LOG_LEVEL` is set, or when
/// the `tracing-subscriber` feature is disabled, leaving subscriber setup to
/// the application.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("LOADOUT_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "loadout={},loadout_query={},loadout_schema={},loadout_memory={}",
                level, level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            match get_log_format() {
                "json" => registry.with(fmt::layer().json()).init(),
                "compact" => registry.with(fmt::layer().compact()).init(),
                _ => registry.with(fmt::layer().pretty()).init(),
            }

            tracing::info!(
                level = level,
                format = get_log_format(),
                "loadout logging initialized"
            );
        }
    });
}

/// Conditional debug logging, only emitted when `LOADOUT_DEBUG` is enabled.
#[macro_export]
macro_rules! loadout_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Conditional trace logging, only emitted when `LOADOUT_DEBUG` is enabled.
#[macro_export]
macro_rules! loadout_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
