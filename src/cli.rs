// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `uriwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "uriwatch",
    version,
    about = "Fetch a URI, or watch it and stream its changes.",
    long_about = None
)]
pub struct CliArgs {
    /// The URI to fetch (file://, http://, https://).
    #[arg(value_name = "URI")]
    pub uri: String,

    /// Keep polling the URI and print every change until Ctrl-C.
    #[arg(long)]
    pub watch: bool,

    /// Poll interval in seconds when watching.
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub interval: u64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `URIWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
