// src/exec/monitored.rs

//! Runtime wrapper around one subprocess.
//!
//! A `MonitoredCommand` turns a [`CommandSpec`] into a running process,
//! forwards its stdout/stderr into the output multiplexer and knows how to
//! terminate it (and everything it spawned) within a bounded time.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::output::{forward_stream, OutputMultiplexer};

use super::error::CommandError;
use super::expand::expand_env;
use super::shell::build_command;
use super::spec::CommandSpec;

/// How long a process may outlive SIGKILL before it is reported unkillable.
pub const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the output readers once the process is gone.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one command.
///
/// Only moves forward: `Pending -> Running -> {Exited, Killed, Failed}`,
/// or `Pending -> Failed` when the process cannot be spawned.
#[derive(Debug)]
pub enum CommandState {
    Pending,
    Running,
    Exited(i32),
    Killed,
    Failed(CommandError),
}

impl CommandState {
    pub fn is_running(&self) -> bool {
        matches!(self, CommandState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandState::Exited(_) | CommandState::Killed | CommandState::Failed(_)
        )
    }

    /// Nonzero exits and errors are failures; being stopped is not.
    pub fn is_failure(&self) -> bool {
        match self {
            CommandState::Exited(code) => *code != 0,
            CommandState::Failed(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandState::Pending => f.write_str("pending"),
            CommandState::Running => f.write_str("running"),
            CommandState::Exited(code) => write!(f, "exited with code {code}"),
            CommandState::Killed => f.write_str("killed"),
            CommandState::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

#[derive(Debug)]
pub struct MonitoredCommand {
    spec: CommandSpec,
    /// Shell text after environment expansion, set on start.
    command_line: String,
    child: Option<Child>,
    pid: Option<u32>,
    state: CommandState,
    readers: Vec<JoinHandle<io::Result<u64>>>,
}

impl MonitoredCommand {
    pub fn new(spec: CommandSpec) -> Self {
        let command_line = spec.shell_text.clone();
        Self {
            spec,
            command_line,
            child: None,
            pid: None,
            state: CommandState::Pending,
            readers: Vec::new(),
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn state(&self) -> &CommandState {
        &self.state
    }

    /// Pid of the spawned process (also its process-group id on Unix).
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn into_parts(self) -> (CommandSpec, Option<u32>, CommandState) {
        (self.spec, self.pid, self.state)
    }

    /// Spawn the process and attach the stdout/stderr readers.
    ///
    /// Returns as soon as the process is launched (or failed to launch).
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, mux: &OutputMultiplexer) -> &CommandState {
        if !matches!(self.state, CommandState::Pending) {
            warn!(
                command = %self.spec.display_name(),
                state = %self.state,
                "start ignored; command was already started"
            );
            return &self.state;
        }

        self.state = match self.spawn(mux) {
            Ok(pid) => {
                info!(
                    command = %self.spec.display_name(),
                    pid,
                    cmd = %self.command_line,
                    login_shell = self.spec.use_login_shell,
                    "command started"
                );
                CommandState::Running
            }
            Err(err) => {
                error!(
                    command = %self.spec.display_name(),
                    error = %err,
                    "command could not be started"
                );
                CommandState::Failed(err)
            }
        };

        &self.state
    }

    fn spawn(&mut self, mux: &OutputMultiplexer) -> Result<u32, CommandError> {
        self.command_line = expand_env(&self.spec.shell_text);

        let dir = match self.spec.working_dir.as_deref() {
            Some(raw) => Some(resolve_working_dir(raw)?),
            None => None,
        };

        let mut child = build_command(&self.spec, &self.command_line, dir.as_deref())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: self.command_line.clone(),
                source,
            })?;

        // `id()` is only `None` once the child has been reaped.
        let pid = child.id().unwrap_or_default();

        if let Some(stdout) = child.stdout.take() {
            let channel = mux.channel(&self.spec.name, self.spec.silence);
            self.readers.push(tokio::spawn(forward_stream(stdout, channel)));
        }
        if let Some(stderr) = child.stderr.take() {
            let channel = mux.channel(&self.spec.name, self.spec.silence);
            self.readers.push(tokio::spawn(forward_stream(stderr, channel)));
        }

        self.child = Some(child);
        self.pid = Some(pid);
        Ok(pid)
    }

    /// Wait for the process to exit on its own and record how it ended.
    ///
    /// Cancel-safe: dropping the future leaves the command `Running`.
    pub async fn wait(&mut self) -> &CommandState {
        if !self.state.is_running() {
            return &self.state;
        }
        let Some(child) = self.child.as_mut() else {
            return &self.state;
        };

        let result = child.wait().await;
        self.state = match result {
            Ok(status) => exit_state(status, &self.command_line),
            Err(e) => CommandState::Failed(CommandError::Wait(e)),
        };

        info!(
            command = %self.spec.display_name(),
            pid = self.pid,
            state = %self.state,
            failed = self.state.is_failure(),
            "command exited"
        );
        &self.state
    }

    /// Terminate the process tree: SIGTERM, up to `grace` to exit, then SIGKILL.
    ///
    /// No-op unless the command is `Running`. A process that already exited
    /// keeps its real exit status.
    pub async fn stop(&mut self, grace: Duration) -> &CommandState {
        if !self.state.is_running() {
            return &self.state;
        }
        let (Some(child), Some(pid)) = (self.child.as_mut(), self.pid) else {
            return &self.state;
        };
        let name = self.spec.display_name();

        match child.try_wait() {
            Ok(Some(status)) => {
                self.state = exit_state(status, &self.command_line);
                debug!(command = %name, pid, state = %self.state, "command had already exited");
                return &self.state;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(command = %name, pid, error = %e, "could not poll process status");
            }
        }

        info!(
            command = %name,
            pid,
            grace_ms = grace.as_millis() as u64,
            "stopping command"
        );
        request_termination(child, pid, name);

        let state = match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %name, pid, ?status, "command exited after termination request");
                CommandState::Killed
            }
            Ok(Err(e)) => CommandState::Failed(CommandError::Wait(e)),
            Err(_elapsed) => {
                warn!(command = %name, pid, "grace period elapsed; forcing kill");
                force_kill(child, pid, name).await
            }
        };

        self.state = state;
        &self.state
    }

    /// Reap leftover group members and wait for the output readers.
    ///
    /// Call once the command is terminal so every trailing line reaches the
    /// sink before the run reports.
    pub async fn finish_output(&mut self) {
        #[cfg(unix)]
        if let (Some(pid), true) = (self.pid, self.state.is_terminal()) {
            match super::signals::kill_group(pid) {
                Ok(true) => debug!(command = %self.spec.display_name(), pid, "killed leftover processes in group"),
                Ok(false) => {}
                Err(e) => warn!(
                    command = %self.spec.display_name(),
                    pid,
                    error = %e,
                    "failed to reap process group"
                ),
            }
        }

        for mut reader in self.readers.drain(..) {
            match timeout(OUTPUT_DRAIN_TIMEOUT, &mut reader).await {
                Ok(Ok(Ok(_bytes))) => {}
                Ok(Ok(Err(e))) => {
                    warn!(command = %self.spec.display_name(), error = %e, "output forwarding failed");
                }
                Ok(Err(e)) => {
                    warn!(command = %self.spec.display_name(), error = %e, "output reader task failed");
                }
                Err(_elapsed) => {
                    warn!(
                        command = %self.spec.display_name(),
                        "output still open after process exit; detaching reader"
                    );
                    reader.abort();
                }
            }
        }
    }
}

fn resolve_working_dir(raw: &str) -> Result<PathBuf, CommandError> {
    let dir = PathBuf::from(expand_env(raw));
    match std::fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => Ok(dir),
        Ok(_) => Err(CommandError::WorkingDir {
            dir,
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        }),
        Err(source) => Err(CommandError::WorkingDir { dir, source }),
    }
}

/// Map an exit status to a terminal state.
///
/// With shell invocation a missing program is reported by the shell as 127
/// (126 when it exists but cannot be executed).
fn exit_state(status: ExitStatus, command_line: &str) -> CommandState {
    match status.code() {
        Some(127) => CommandState::Failed(CommandError::CommandNotFound {
            command: command_line.to_string(),
        }),
        Some(126) => CommandState::Failed(CommandError::NotExecutable {
            command: command_line.to_string(),
        }),
        Some(code) => CommandState::Exited(code),
        None => CommandState::Exited(signal_exit_code(status)),
    }
}

#[cfg(unix)]
fn signal_exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| 128 + sig).unwrap_or(-1)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: ExitStatus) -> i32 {
    -1
}

#[cfg(unix)]
fn request_termination(_child: &mut Child, pid: u32, name: &str) {
    if let Err(e) = super::signals::terminate_group(pid) {
        warn!(command = %name, pid, error = %e, "failed to deliver SIGTERM");
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, pid: u32, name: &str) {
    if let Err(e) = child.start_kill() {
        warn!(command = %name, pid, error = %e, "failed to terminate process");
    }
}

async fn force_kill(child: &mut Child, pid: u32, name: &str) -> CommandState {
    #[cfg(unix)]
    if let Err(e) = super::signals::kill_group(pid) {
        warn!(command = %name, pid, error = %e, "failed to deliver SIGKILL to process group");
    }
    if let Err(e) = child.start_kill() {
        debug!(command = %name, pid, error = %e, "start_kill on child failed");
    }

    match timeout(FORCE_KILL_TIMEOUT, child.wait()).await {
        Ok(Ok(_)) => CommandState::Killed,
        Ok(Err(e)) => CommandState::Failed(CommandError::Wait(e)),
        Err(_elapsed) => {
            error!(command = %name, pid, "process survived SIGKILL");
            CommandState::Failed(CommandError::Unkillable { pid })
        }
    }
}
