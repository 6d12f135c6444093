// src/logging.rs

//! Logging setup for `muxterm` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `MUXTERM_LOG` environment variable (any `EnvFilter` directive,
//!    e.g. "info" or "muxterm::exec=debug")
//! 3. default to `warn`
//!
//! Logs are sent to STDERR so that stdout carries only the multiplexed
//! command output.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var("MUXTERM_LOG").ok();
    let filter = build_filter(cli_level, env_value.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    let directives = cli_level
        .map(LogLevel::as_str)
        .or(env_value.map(str::trim).filter(|v| !v.is_empty()))
        .unwrap_or("warn");

    EnvFilter::builder().parse_lossy(directives)
}
