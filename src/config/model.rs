// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::{OrchestratorOptions, DEFAULT_GRACE_PERIOD};
use crate::exec::CommandSpec;
use crate::types::{parse_duration, Shell};

/// One command set as read from a TOML file.
///
/// In a config directory every file is a set, run by its `name`. A file
/// passed with `--config` may leave the set metadata out.
///
/// ```toml
/// name = "dev"
/// short = "api and database"
///
/// [config]
/// shell = "bash"
/// grace_period = "2s"
///
/// [[command]]
/// name = "api"
/// command = "cargo run"
/// directory = "$HOME/src/api"
///
/// [[command]]
/// name = "db"
/// command = "docker compose up postgres"
/// silence = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Set name, used as the subcommand that runs it.
    #[serde(default)]
    pub name: String,

    /// One-line description shown by `muxterm list`.
    #[serde(default)]
    pub short: String,

    /// Longer description shown by `muxterm <set> --help`.
    #[serde(default)]
    pub long: Option<String>,

    /// Run-wide behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Commands from `[[command]]`, in file order.
    #[serde(default, rename = "command")]
    pub commands: Vec<CommandConfig>,

    /// Where the file was loaded from; set by the loader.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// `"sh"`, `"bash"` or `"zsh"`. When set, every command runs through a
    /// login shell of that kind; otherwise commands run with `sh -c`.
    #[serde(default)]
    pub shell: Option<String>,

    /// Duration string (e.g. `"2s"`) between SIGTERM and SIGKILL.
    #[serde(default)]
    pub grace_period: Option<String>,

    /// Stop everything as soon as one command fails.
    #[serde(default)]
    pub fail_fast: bool,
}

/// One `[[command]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    /// Output prefix. Optional; unnamed commands print unprefixed.
    #[serde(default)]
    pub name: String,

    /// Shell text to run. `$VAR`/`${VAR}` are expanded from the
    /// environment first; write `$$` for a literal `$`.
    pub command: String,

    /// Working directory, may contain `$VAR` references.
    #[serde(default)]
    pub directory: Option<String>,

    /// Discard this command's output.
    #[serde(default)]
    pub silence: bool,
}

impl ConfigFile {
    /// Login shell requested by `[config].shell`, if any.
    ///
    /// Unknown names are rejected by validation, so they are ignored here.
    pub fn login_shell(&self) -> Option<Shell> {
        self.config.shell.as_deref().and_then(|s| s.parse().ok())
    }

    /// Command specifications in file order.
    pub fn command_specs(&self) -> Vec<CommandSpec> {
        let login_shell = self.login_shell();

        self.commands
            .iter()
            .map(|c| CommandSpec {
                name: c.name.clone(),
                shell_text: c.command.clone(),
                working_dir: c.directory.clone().filter(|d| !d.trim().is_empty()),
                use_login_shell: login_shell.is_some(),
                shell: login_shell.unwrap_or_default(),
                silence: c.silence,
            })
            .collect()
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        let grace_period = self
            .config
            .grace_period
            .as_deref()
            .and_then(|s| parse_duration(s).ok())
            .unwrap_or(DEFAULT_GRACE_PERIOD);

        OrchestratorOptions {
            grace_period,
            fail_fast: self.config.fail_fast,
        }
    }
}
