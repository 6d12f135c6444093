// src/exec/mod.rs

//! Process execution layer.
//!
//! This module turns command specifications into running processes, using
//! `tokio::process::Command`, and forwards their output to the multiplexer.
//!
//! - [`spec`] holds the immutable [`CommandSpec`].
//! - [`expand`] resolves `$VAR` references at spawn time.
//! - [`shell`] builds the direct or login-shell invocation.
//! - [`signals`] delivers SIGTERM/SIGKILL to a command's process group.
//! - [`monitored`] owns one process: start, wait, stop.

pub mod error;
pub mod expand;
pub mod monitored;
pub mod shell;
#[cfg(unix)]
pub mod signals;
pub mod spec;

pub use error::CommandError;
pub use monitored::{CommandState, MonitoredCommand};
pub use spec::CommandSpec;
