// src/engine/mod.rs

//! Orchestration engine for muxterm.
//!
//! The pure run-state machine lives in [`core`]; the async/IO shell that
//! owns the processes is implemented in [`orchestrator`].

use std::time::Duration;

use crate::exec::CommandState;

/// Grace period between SIGTERM and SIGKILL when none is configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Lifecycle of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Accepting commands; nothing started.
    Idle,
    /// Processes started; waiting for them or for an interrupt.
    Running,
    /// Stopping whatever is still running.
    Draining,
    /// Every command is terminal.
    Done,
}

/// Events flowing into the orchestrator from supervisors and interrupt handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// The command at `index` reached a terminal state and its output is flushed.
    CommandFinished { index: usize, failed: bool },
    /// External cancellation (e.g. Ctrl-C).
    InterruptRequested,
    /// Stop without waiting for the grace period (e.g. a second Ctrl-C).
    ForceStopRequested,
}

/// Explicit run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Time each command gets to exit after SIGTERM before it is killed.
    pub grace_period: Duration,
    /// Drain the whole run as soon as one command fails.
    ///
    /// Off by default: commands run to completion and failures are only
    /// aggregated at the end.
    pub fail_fast: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            fail_fast: false,
        }
    }
}

/// Terminal outcome of one command.
#[derive(Debug)]
pub struct CommandReport {
    pub name: String,
    pub pid: Option<u32>,
    pub state: CommandState,
}

/// Combined outcome of all commands of one run, in the order they were added.
#[derive(Debug)]
pub struct AggregateResult {
    pub commands: Vec<CommandReport>,
    pub any_failed: bool,
    /// The run was cut short by an interrupt.
    pub interrupted: bool,
}

impl AggregateResult {
    pub fn failures(&self) -> impl Iterator<Item = &CommandReport> {
        self.commands.iter().filter(|c| c.state.is_failure())
    }
}

pub mod core;
pub mod orchestrator;

pub use core::{CoreCommand, CoreStep, RunTracker};
pub use orchestrator::{InterruptHandle, Orchestrator};
