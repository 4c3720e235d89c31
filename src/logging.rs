//! Structured logging for store and CLI operations
//!
//! Log lines go through the `log` facade. Significant events carry a JSON
//! payload appended after the human message: `message | {"event": ...}`.
//! The binary installs `env_logger` as the backend.

use anyhow::{anyhow, Result};
use log::{Level, LevelFilter};
use serde_json::{json, Value};

/// Initialize the env_logger backend.
///
/// `RUST_LOG` takes precedence over the level passed in.
pub fn init_logging(level: LevelFilter) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to set logger: {}", e))
}

/// Parse a configured level name (`error`, `warn`, `info`, `debug`, `trace`, `off`)
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Raise a base level by the number of `-v` flags given
pub fn level_for_verbosity(base: LevelFilter, verbosity: u8) -> LevelFilter {
    let mut level = base;
    for _ in 0..verbosity {
        level = match level {
            LevelFilter::Off => LevelFilter::Error,
            LevelFilter::Error => LevelFilter::Warn,
            LevelFilter::Warn => LevelFilter::Info,
            LevelFilter::Info => LevelFilter::Debug,
            LevelFilter::Debug | LevelFilter::Trace => LevelFilter::Trace,
        };
    }
    level
}

/// Build the JSON payload for a named event, stamping it with the current time
pub fn event(name: &str, mut fields: Value) -> Value {
    if let Value::Object(map) = &mut fields {
        map.insert("event".to_string(), json!(name));
        map.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        fields
    } else {
        json!({
            "event": name,
            "data": fields,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Emit a message with its structured payload
pub fn log_structured(level: Level, message: &str, data: &Value) {
    if log::log_enabled!(level) {
        log::log!(level, "{} | {}", message, data);
    }
}
