// src/exec/error.rs

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single command failed.
///
/// These never abort the run; they end up in that command's terminal state.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("working directory {dir:?} is not usable: {source}")]
    WorkingDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("command not found: `{command}`")]
    CommandNotFound { command: String },

    #[error("command is not executable: `{command}`")]
    NotExecutable { command: String },

    #[error("failed waiting for process: {0}")]
    Wait(#[source] io::Error),

    #[error("process {pid} survived a forced kill")]
    Unkillable { pid: u32 },
}

impl CommandError {
    /// The process (or the program the shell was asked to run) never started.
    pub fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            CommandError::Spawn { .. }
                | CommandError::WorkingDir { .. }
                | CommandError::CommandNotFound { .. }
                | CommandError::NotExecutable { .. }
        )
    }
}
