// src/logging.rs

//! Logging setup for `uriwatch` using `tracing` + `tracing-subscriber`.
//!
//! The level comes from the `--log-level` flag when given, otherwise from
//! the `URIWATCH_LOG` environment variable (e.g. "info", "debug"),
//! otherwise it defaults to `info`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_max_level(resolve_level(cli_level))
        .with_target(true)
        .init();

    Ok(())
}

fn resolve_level(cli_level: Option<LogLevel>) -> Level {
    cli_level.map(Level::from).unwrap_or_else(|| {
        std::env::var("URIWATCH_LOG")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(Level::INFO)
    })
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
