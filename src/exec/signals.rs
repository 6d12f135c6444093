// src/exec/signals.rs

//! Signal delivery to a command's process group.
//!
//! Children are spawned as process-group leaders, so the group id equals
//! the child's pid. Signalling the group reaches grandchildren started by
//! the shell as well.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

fn send(pgid: u32, signal: Signal) -> Result<bool, nix::Error> {
    let raw = i32::try_from(pgid).map_err(|_| Errno::EINVAL)?;
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => Ok(true),
        // The whole group is already gone.
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Soft termination (SIGTERM). `Ok(false)` means nothing was left to signal.
pub fn terminate_group(pgid: u32) -> Result<bool, nix::Error> {
    send(pgid, Signal::SIGTERM)
}

/// Forced termination (SIGKILL).
pub fn kill_group(pgid: u32) -> Result<bool, nix::Error> {
    send(pgid, Signal::SIGKILL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signalling_a_missing_group_is_not_an_error() {
        // pid_max on Linux is at most 2^22, so this group cannot exist.
        assert_eq!(kill_group(i32::MAX as u32 - 7), Ok(false));
    }
}
