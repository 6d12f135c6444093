pub mod sink;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

use muxterm::exec::CommandSpec;

pub use sink::SharedBuffer;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Direct-invocation spec with the given name and shell text.
pub fn spec(name: &str, shell_text: &str) -> CommandSpec {
    CommandSpec::new(name, shell_text)
}

/// Same as [`spec`] but with output silenced.
pub fn silent_spec(name: &str, shell_text: &str) -> CommandSpec {
    CommandSpec {
        silence: true,
        ..CommandSpec::new(name, shell_text)
    }
}

/// Whether a live (non-zombie) process with this pid exists.
///
/// Orphaned grandchildren are reaped by init; in containers without a
/// reaping init they linger as zombies, which count as dead here.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // Format: `pid (comm) state ...`; comm may contain spaces.
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let after_comm = stat.rsplit_once(')')?.1;
            after_comm.split_whitespace().next().map(|state| state == "Z")
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Poll until `pid` is gone or `within` elapses; returns whether it died.
#[cfg(unix)]
pub async fn wait_for_exit(pid: u32, within: std::time::Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    !process_alive(pid)
}
