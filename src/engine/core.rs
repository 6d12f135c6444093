// src/engine/core.rs

//! Pure run-state machine.
//!
//! `RunTracker` consumes [`OrchestratorEvent`]s and returns the commands the
//! IO shell should carry out. It has no channels, no Tokio types and performs
//! no IO, so the termination and draining rules are unit tested directly.

use tracing::{debug, info};

use super::{OrchestratorEvent, RunPhase};

/// What the IO shell should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCommand {
    /// Ask every still-running command to stop.
    StopRunning,
    /// Cut any grace period short and kill whatever is still running.
    KillRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn proceed() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }

    fn drain() -> Self {
        Self {
            commands: vec![CoreCommand::StopRunning],
            keep_running: true,
        }
    }

    fn kill() -> Self {
        Self {
            commands: vec![CoreCommand::StopRunning, CoreCommand::KillRunning],
            keep_running: true,
        }
    }

    fn done() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}

#[derive(Debug)]
pub struct RunTracker {
    phase: RunPhase,
    finished: Vec<bool>,
    remaining: usize,
    fail_fast: bool,
    interrupted: bool,
    forced: bool,
    any_failed: bool,
}

impl RunTracker {
    pub fn new(total: usize, fail_fast: bool) -> Self {
        Self {
            phase: RunPhase::Idle,
            finished: vec![false; total],
            remaining: total,
            fail_fast,
            interrupted: false,
            forced: false,
            any_failed: false,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn any_failed(&self) -> bool {
        self.any_failed
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// All commands have been started: `Idle -> Running`.
    ///
    /// An interrupt recorded while idle sends the run straight to draining.
    pub fn begin(&mut self) -> CoreStep {
        if self.phase != RunPhase::Idle {
            return self.current_step();
        }
        self.phase = RunPhase::Running;

        if self.remaining == 0 {
            self.phase = RunPhase::Done;
            return CoreStep::done();
        }
        if self.forced {
            info!(remaining = self.remaining, "force stop requested before start");
            self.phase = RunPhase::Draining;
            return CoreStep::kill();
        }
        if self.interrupted {
            return self.enter_draining("interrupted before start");
        }
        CoreStep::proceed()
    }

    pub fn step(&mut self, event: OrchestratorEvent) -> CoreStep {
        match event {
            OrchestratorEvent::CommandFinished { index, failed } => {
                self.handle_finished(index, failed)
            }
            OrchestratorEvent::InterruptRequested => self.handle_interrupt(),
            OrchestratorEvent::ForceStopRequested => self.handle_force_stop(),
        }
    }

    fn handle_finished(&mut self, index: usize, failed: bool) -> CoreStep {
        match self.finished.get_mut(index) {
            Some(done) if !*done => *done = true,
            _ => {
                debug!(index, "ignoring duplicate or unknown completion");
                return self.current_step();
            }
        }

        self.remaining -= 1;
        self.any_failed |= failed;

        if self.remaining == 0 {
            info!(phase = ?self.phase, "all commands are terminal");
            self.phase = RunPhase::Done;
            return CoreStep::done();
        }

        if failed && self.fail_fast && self.phase == RunPhase::Running {
            return self.enter_draining("command failed with fail_fast enabled");
        }

        CoreStep::proceed()
    }

    fn handle_interrupt(&mut self) -> CoreStep {
        if self.phase == RunPhase::Done {
            return CoreStep::done();
        }
        self.interrupted = true;
        match self.phase {
            RunPhase::Running => self.enter_draining("interrupt requested"),
            // Idle: picked up by `begin`. Draining/Done: nothing more to do.
            _ => self.current_step(),
        }
    }

    /// Kill everything still running. Also counts as an interrupt.
    fn handle_force_stop(&mut self) -> CoreStep {
        if self.phase == RunPhase::Done {
            return CoreStep::done();
        }
        self.interrupted = true;
        if self.forced {
            return self.current_step();
        }
        self.forced = true;

        match self.phase {
            RunPhase::Idle => self.current_step(),
            _ => {
                info!(remaining = self.remaining, "force stop requested");
                self.phase = RunPhase::Draining;
                CoreStep::kill()
            }
        }
    }

    fn enter_draining(&mut self, reason: &str) -> CoreStep {
        info!(reason, remaining = self.remaining, "draining run");
        self.phase = RunPhase::Draining;
        CoreStep::drain()
    }

    fn current_step(&self) -> CoreStep {
        if self.phase == RunPhase::Done {
            CoreStep::done()
        } else {
            CoreStep::proceed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(index: usize, failed: bool) -> OrchestratorEvent {
        OrchestratorEvent::CommandFinished { index, failed }
    }

    #[test]
    fn empty_run_is_done_immediately() {
        let mut t = RunTracker::new(0, false);
        assert_eq!(t.begin(), CoreStep::done());
        assert_eq!(t.phase(), RunPhase::Done);
    }

    #[test]
    fn runs_until_every_command_finished() {
        let mut t = RunTracker::new(2, false);
        assert!(t.begin().keep_running);
        assert_eq!(t.phase(), RunPhase::Running);

        let step = t.step(finished(1, true));
        assert!(step.keep_running);
        assert!(step.commands.is_empty(), "a failure must not cancel siblings by default");

        assert_eq!(t.step(finished(0, false)), CoreStep::done());
        assert!(t.any_failed());
        assert!(!t.interrupted());
    }

    #[test]
    fn interrupt_enters_draining_once() {
        let mut t = RunTracker::new(2, false);
        t.begin();

        let step = t.step(OrchestratorEvent::InterruptRequested);
        assert_eq!(step.commands, vec![CoreCommand::StopRunning]);
        assert_eq!(t.phase(), RunPhase::Draining);

        let again = t.step(OrchestratorEvent::InterruptRequested);
        assert!(again.commands.is_empty());

        t.step(finished(0, false));
        assert_eq!(t.step(finished(1, false)), CoreStep::done());
        assert!(t.interrupted());
    }

    #[test]
    fn interrupt_before_begin_drains_on_begin() {
        let mut t = RunTracker::new(1, false);
        t.step(OrchestratorEvent::InterruptRequested);
        assert_eq!(t.phase(), RunPhase::Idle);

        assert_eq!(t.begin().commands, vec![CoreCommand::StopRunning]);
        assert_eq!(t.phase(), RunPhase::Draining);
    }

    #[test]
    fn fail_fast_drains_on_first_failure() {
        let mut t = RunTracker::new(3, true);
        t.begin();

        assert!(t.step(finished(0, false)).commands.is_empty());
        assert_eq!(t.step(finished(2, true)).commands, vec![CoreCommand::StopRunning]);
        assert_eq!(t.phase(), RunPhase::Draining);
        assert_eq!(t.step(finished(1, false)), CoreStep::done());
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let mut t = RunTracker::new(2, false);
        t.begin();
        t.step(finished(0, false));
        t.step(finished(0, true));

        assert_eq!(t.remaining(), 1);
        assert!(!t.any_failed());
    }

    #[test]
    fn force_stop_while_draining_kills_once() {
        let mut t = RunTracker::new(2, false);
        t.begin();
        t.step(OrchestratorEvent::InterruptRequested);

        let step = t.step(OrchestratorEvent::ForceStopRequested);
        assert!(step.commands.contains(&CoreCommand::KillRunning));
        assert!(step.keep_running);

        assert!(t.step(OrchestratorEvent::ForceStopRequested).commands.is_empty());
        t.step(finished(0, false));
        assert_eq!(t.step(finished(1, false)), CoreStep::done());
        assert!(t.interrupted());
    }

    #[test]
    fn force_stop_while_running_stops_and_kills() {
        let mut t = RunTracker::new(1, false);
        t.begin();

        let step = t.step(OrchestratorEvent::ForceStopRequested);
        assert_eq!(step.commands, vec![CoreCommand::StopRunning, CoreCommand::KillRunning]);
        assert_eq!(t.phase(), RunPhase::Draining);
        assert!(t.interrupted());
    }

    #[test]
    fn force_stop_before_begin_kills_on_begin() {
        let mut t = RunTracker::new(1, false);
        t.step(OrchestratorEvent::ForceStopRequested);

        assert_eq!(
            t.begin().commands,
            vec![CoreCommand::StopRunning, CoreCommand::KillRunning]
        );
    }

    #[test]
    fn interrupt_after_done_is_a_no_op() {
        let mut t = RunTracker::new(1, false);
        t.begin();
        t.step(finished(0, false));

        assert_eq!(t.step(OrchestratorEvent::InterruptRequested), CoreStep::done());
        assert_eq!(t.phase(), RunPhase::Done);
        assert!(!t.interrupted());
    }
}
