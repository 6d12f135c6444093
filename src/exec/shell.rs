// src/exec/shell.rs

//! Building the OS command for a [`CommandSpec`].

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use super::spec::CommandSpec;

/// Program and arguments that will run `text` for `spec`.
///
/// - direct: `sh -c <text>` (`cmd /C <text>` on Windows)
/// - login shell: `<shell> -l -c <text>`
pub fn invocation(spec: &CommandSpec, text: &str) -> (String, Vec<String>) {
    if spec.use_login_shell {
        return (
            spec.shell.program().to_string(),
            vec!["-l".to_string(), "-c".to_string(), text.to_string()],
        );
    }

    if cfg!(windows) {
        ("cmd".to_string(), vec!["/C".to_string(), text.to_string()])
    } else {
        ("sh".to_string(), vec!["-c".to_string(), text.to_string()])
    }
}

/// Build a ready-to-spawn command with piped output.
///
/// On Unix the child becomes the leader of a new process group so the whole
/// tree can be signalled at once. Stdin is closed: children in a background
/// process group must not read from the terminal.
pub fn build_command(spec: &CommandSpec, text: &str, dir: Option<&Path>) -> Command {
    let (program, args) = invocation(spec, text);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shell;

    #[test]
    fn login_shell_uses_selected_shell() {
        let spec = CommandSpec {
            use_login_shell: true,
            shell: Shell::Zsh,
            ..CommandSpec::new("a", "make dev")
        };

        let (program, args) = invocation(&spec, "make dev");
        assert_eq!(program, "zsh");
        assert_eq!(args, vec!["-l", "-c", "make dev"]);
    }

    #[cfg(unix)]
    #[test]
    fn direct_invocation_goes_through_sh() {
        let spec = CommandSpec::new("a", "echo $HOME");

        let (program, args) = invocation(&spec, "echo /root");
        assert_eq!(program, "sh");
        assert_eq!(args, vec!["-c", "echo /root"]);
    }
}
