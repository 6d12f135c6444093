// src/engine/orchestrator.rs

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::exec::{CommandError, CommandSpec, CommandState, MonitoredCommand};
use crate::output::OutputMultiplexer;

use super::core::{CoreCommand, RunTracker};
use super::{AggregateResult, CommandReport, OrchestratorEvent, OrchestratorOptions};

/// Owns one batch of commands for exactly one run.
///
/// Commands are added while idle; [`Orchestrator::run_commands`] consumes the
/// orchestrator, so an instance can never be reused.
pub struct Orchestrator {
    specs: Vec<CommandSpec>,
    options: OrchestratorOptions,
    mux: OutputMultiplexer,
    events_tx: mpsc::Sender<OrchestratorEvent>,
    events_rx: mpsc::Receiver<OrchestratorEvent>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("specs", &self.specs)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Cloneable handle used to interrupt a run from outside (e.g. Ctrl-C).
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: mpsc::Sender<OrchestratorEvent>,
}

impl InterruptHandle {
    /// Request cancellation. Returns `false` if the run has already ended.
    pub async fn interrupt(&self) -> bool {
        self.tx
            .send(OrchestratorEvent::InterruptRequested)
            .await
            .is_ok()
    }

    /// Like [`interrupt`](Self::interrupt), but running commands are killed
    /// right away instead of getting the grace period.
    pub async fn force_stop(&self) -> bool {
        self.tx
            .send(OrchestratorEvent::ForceStopRequested)
            .await
            .is_ok()
    }
}

/// Orchestrator-side handle for one supervising task.
struct Supervisor {
    name: String,
    stop: Option<oneshot::Sender<Duration>>,
    kill: Option<oneshot::Sender<()>>,
    handle: JoinHandle<MonitoredCommand>,
}

impl Orchestrator {
    /// Default options, output to stdout.
    pub fn new() -> Self {
        Self::with_options(OrchestratorOptions::default(), OutputMultiplexer::stdout())
    }

    pub fn with_options(options: OrchestratorOptions, mux: OutputMultiplexer) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            specs: Vec::new(),
            options,
            mux,
            events_tx,
            events_rx,
        }
    }

    /// Queue specs for the run. Nothing is started yet.
    pub fn add_commands<I>(&mut self, specs: I)
    where
        I: IntoIterator<Item = CommandSpec>,
    {
        self.specs.extend(specs);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: self.events_tx.clone(),
        }
    }

    /// Start every command and block until the run is over.
    ///
    /// The run ends when all commands are terminal, or drains early on an
    /// interrupt (or the first failure with `fail_fast`). Draining stops every
    /// still-running command concurrently. When this returns, no process
    /// started by the run is left alive.
    pub async fn run_commands(mut self) -> AggregateResult {
        let total = self.specs.len();
        let grace = self.options.grace_period;
        let mut tracker = RunTracker::new(total, self.options.fail_fast);

        info!(
            commands = total,
            fail_fast = self.options.fail_fast,
            grace_ms = grace.as_millis() as u64,
            "starting run"
        );

        let specs = std::mem::take(&mut self.specs);
        let mut supervisors = Vec::with_capacity(total);

        for (index, spec) in specs.into_iter().enumerate() {
            let name = spec.name.clone();
            let mut command = MonitoredCommand::new(spec);
            command.start(&self.mux);

            let (stop_tx, stop_rx) = oneshot::channel();
            let (kill_tx, kill_rx) = oneshot::channel();
            let handle = tokio::spawn(supervise(
                index,
                command,
                StopSignals {
                    stop: stop_rx,
                    kill: kill_rx,
                },
                self.events_tx.clone(),
                grace,
            ));

            supervisors.push(Supervisor {
                name,
                stop: Some(stop_tx),
                kill: Some(kill_tx),
                handle,
            });
        }

        let mut step = tracker.begin();
        loop {
            for command in step.commands.drain(..) {
                match command {
                    CoreCommand::StopRunning => stop_all(&mut supervisors, grace),
                    CoreCommand::KillRunning => kill_all(&mut supervisors),
                }
            }

            if !step.keep_running {
                break;
            }

            // `self` keeps a sender alive, so this only yields events.
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            debug!(?event, phase = ?tracker.phase(), "orchestrator received event");
            step = tracker.step(event);
        }

        let mut commands = Vec::with_capacity(total);
        for supervisor in supervisors {
            commands.push(collect(supervisor).await);
        }

        let any_failed = commands.iter().any(|c| c.state.is_failure());
        info!(
            any_failed,
            interrupted = tracker.interrupted(),
            "run finished"
        );

        AggregateResult {
            commands,
            any_failed,
            interrupted: tracker.interrupted(),
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn stop_all(supervisors: &mut [Supervisor], grace: Duration) {
    for supervisor in supervisors.iter_mut() {
        if let Some(stop) = supervisor.stop.take() {
            // A closed receiver means the command already finished.
            if stop.send(grace).is_err() {
                debug!(command = %supervisor.name, "command already finished before stop");
            }
        }
    }
}

fn kill_all(supervisors: &mut [Supervisor]) {
    for supervisor in supervisors.iter_mut() {
        if let Some(kill) = supervisor.kill.take() {
            if kill.send(()).is_err() {
                debug!(command = %supervisor.name, "command already finished before kill");
            }
        }
    }
}

async fn collect(supervisor: Supervisor) -> CommandReport {
    match supervisor.handle.await {
        Ok(command) => {
            let (spec, pid, state) = command.into_parts();
            CommandReport {
                name: spec.name,
                pid,
                state,
            }
        }
        Err(e) => {
            error!(command = %supervisor.name, error = %e, "supervisor task failed");
            CommandReport {
                name: supervisor.name,
                pid: None,
                state: CommandState::Failed(CommandError::Wait(io::Error::other(format!(
                    "supervisor task failed: {e}"
                )))),
            }
        }
    }
}

/// Receiving ends of the stop requests for one supervisor.
struct StopSignals {
    /// Graceful stop carrying the grace period.
    stop: oneshot::Receiver<Duration>,
    /// Skip whatever is left of the grace period.
    kill: oneshot::Receiver<()>,
}

/// Drive one command until it is terminal, then report back.
///
/// The process either exits on its own or is stopped on request. If the
/// orchestrator goes away without asking, the command is stopped anyway so
/// it cannot outlive the run.
async fn supervise(
    index: usize,
    mut command: MonitoredCommand,
    signals: StopSignals,
    events_tx: mpsc::Sender<OrchestratorEvent>,
    fallback_grace: Duration,
) -> MonitoredCommand {
    let StopSignals {
        stop: mut stop_rx,
        kill: mut kill_rx,
    } = signals;

    if command.state().is_running() {
        let grace = tokio::select! {
            _ = command.wait() => None,
            stop = &mut stop_rx => Some(stop.unwrap_or_else(|_| {
                debug!(command = %command.spec().display_name(), "orchestrator dropped; stopping command");
                fallback_grace
            })),
        };

        if let Some(grace) = grace {
            tokio::select! {
                _ = command.stop(grace) => {}
                Ok(()) = &mut kill_rx => {
                    debug!(command = %command.spec().display_name(), "kill requested during grace period");
                    command.stop(Duration::ZERO).await;
                }
            }
        }
    }

    command.finish_output().await;

    let failed = command.state().is_failure();
    if events_tx
        .send(OrchestratorEvent::CommandFinished { index, failed })
        .await
        .is_err()
    {
        debug!(command = %command.spec().display_name(), "orchestrator no longer listening");
    }

    command
}
