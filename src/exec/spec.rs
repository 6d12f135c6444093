// src/exec/spec.rs

use crate::types::Shell;

/// Immutable description of one command to run.
///
/// `shell_text` and `working_dir` may reference environment variables
/// (`$HOME`, `${PROJECT}`); they are expanded when the command is started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Line prefix for this command's output. Empty means no prefix.
    pub name: String,
    /// Text handed to the shell after environment expansion.
    ///
    /// `$VAR` and `${VAR}` are replaced before the shell runs (unset means
    /// empty), so `$$` must be written for a `$` the shell should see:
    /// `for f in *; do echo $$f; done`. `$!`, `$?` and other special
    /// parameters pass through untouched. `$$` is therefore *not* the
    /// shell's own pid here.
    pub shell_text: String,
    /// Directory to run in; the current directory when `None`.
    pub working_dir: Option<String>,
    /// Run through `shell -l -c` instead of `sh -c`.
    pub use_login_shell: bool,
    pub shell: Shell,
    /// Drain the output but never forward it.
    pub silence: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, shell_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shell_text: shell_text.into(),
            ..Self::default()
        }
    }

    /// Name used in log fields; unnamed commands are shown by their text.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.shell_text
        } else {
            &self.name
        }
    }
}
