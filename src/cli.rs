// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! `muxterm <SET>` runs a named command set from the config directory.
//! Without a set name the single file from `--config` (or `muxterm.toml`)
//! is run.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::parse_duration;

/// Command-line arguments for `muxterm`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "muxterm",
    version,
    about = "Run several shell commands at once with one prefixed output stream.",
    long_about = None,
    after_help = "Run `muxterm list` to see the command sets in the config directory."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<CliCommand>,

    /// Path to a single config file (TOML).
    ///
    /// Default: `$MUXTERM_CONFIG`, else `muxterm.toml` in the current directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Directory of named command sets.
    ///
    /// Default: `$MUXTERM_CONFIG_DIR`, else `~/.config/muxterm`.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<String>,

    /// Time commands get to exit after SIGTERM (e.g. `500ms`, `2s`).
    ///
    /// Overrides `[config].grace_period`.
    #[arg(long, value_name = "DURATION", value_parser = parse_grace_period)]
    pub grace_period: Option<Duration>,

    /// Stop all commands as soon as one of them fails.
    #[arg(long)]
    pub fail_fast: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MUXTERM_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the commands, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// List the command sets found in the config directory.
    List,

    /// Write a commented example command set to the config directory.
    Example,

    /// Run the named command set (`muxterm <SET>`).
    #[command(external_subcommand)]
    Run(Vec<String>),
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// What the user asked for once a set invocation has been unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetRequest<'a> {
    Run(&'a str),
    Help(&'a str),
}

impl CliCommand {
    /// Unpack `muxterm <SET> [--help]`.
    ///
    /// Global flags must come before the set name; anything else after it
    /// is an error.
    pub fn set_request(&self) -> Result<Option<SetRequest<'_>>, String> {
        let CliCommand::Run(argv) = self else {
            return Ok(None);
        };
        match argv.as_slice() {
            [name] => Ok(Some(SetRequest::Run(name.as_str()))),
            [name, flag] if flag == "--help" || flag == "-h" => {
                Ok(Some(SetRequest::Help(name.as_str())))
            }
            [name, rest @ ..] => Err(format!(
                "unexpected arguments after '{name}': {} (put flags before the set name)",
                rest.join(" ")
            )),
            [] => Err("missing command set name".to_string()),
        }
    }
}

fn parse_grace_period(s: &str) -> Result<Duration, String> {
    parse_duration(s)
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
