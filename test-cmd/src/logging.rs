//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. the level passed to [`init_logging`]
//! 2. `TEST_CMD_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `warn`
//!
//! Logs go to stderr so they never mix with a test's own stdout.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::fmt;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV: &str = "TEST_CMD_LOG";

/// Install the global subscriber.
///
/// Fails if another subscriber is already installed; tests that call this
/// from several places can ignore the error.
pub fn init_logging(level: Option<Level>) -> Result<()> {
    let level = level
        .or_else(|| std::env::var(LOG_ENV).ok().and_then(|s| parse_level_str(&s)))
        .unwrap_or(Level::WARN);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
