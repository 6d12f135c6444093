// tests/output_multiplexing.rs

use std::collections::HashMap;
use std::error::Error;
use std::thread;
use std::time::Duration;

use muxterm::engine::{Orchestrator, OrchestratorOptions};
use muxterm::output::OutputMultiplexer;
use muxterm_test_utils::{init_tracing, silent_spec, spec, with_timeout, SharedBuffer};

type TestResult = Result<(), Box<dyn Error>>;

/// Split `[name] payload` into its parts.
fn split_prefixed(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('[')?;
    let (name, payload) = rest.split_once("] ")?;
    Some((name, payload))
}

#[test]
fn concurrent_writers_never_tear_lines() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mux = OutputMultiplexer::new(buf.clone());
    let writers = 8;
    let lines_per_writer = 500;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let mut channel = mux.channel(&format!("w{w}"), false);
            thread::spawn(move || {
                let mut payload = Vec::new();
                for i in 0..lines_per_writer {
                    payload.extend_from_slice(format!("w{w}-line-{i}-{}\n", "x".repeat(w * 7 + 3)).as_bytes());
                }
                // Odd chunk sizes so lines straddle chunk boundaries.
                for chunk in payload.chunks(13 + w) {
                    channel.feed(chunk).unwrap();
                }
                channel.finish().unwrap();
            })
        })
        .collect();

    for h in handles {
        h.join().map_err(|_| "writer thread panicked")?;
    }

    let mut next_index: HashMap<String, usize> = HashMap::new();
    for line in buf.lines() {
        let (name, payload) = split_prefixed(&line).ok_or("line without prefix")?;
        let w: usize = name.trim_start_matches('w').parse()?;
        let i = next_index.entry(name.to_string()).or_insert(0);

        assert_eq!(payload, format!("w{w}-line-{i}-{}", "x".repeat(w * 7 + 3)));
        *i += 1;
    }

    assert_eq!(next_index.len(), writers);
    assert!(next_index.values().all(|&n| n == lines_per_writer));
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_commands_keep_their_lines_whole_and_ordered() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mut orch = Orchestrator::with_options(
        OrchestratorOptions::default(),
        OutputMultiplexer::new(buf.clone()),
    );

    let commands = 6;
    let lines = 300;
    orch.add_commands((0..commands).map(|c| {
        spec(
            &format!("c{c}"),
            &format!("seq 1 {lines} | sed 's/^/c{c}-payload-/'"),
        )
    }));

    let result = with_timeout(orch.run_commands()).await;
    assert!(!result.any_failed);

    let mut next: HashMap<String, usize> = HashMap::new();
    for line in buf.lines() {
        let (name, payload) = split_prefixed(&line).ok_or("line without prefix")?;
        let n = next.entry(name.to_string()).or_insert(1);
        assert_eq!(payload, format!("{name}-payload-{n}"), "torn or reordered line");
        *n += 1;
    }

    assert_eq!(next.len(), commands);
    assert!(next.values().all(|&n| n == lines + 1));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn silenced_command_writes_nothing_but_is_drained() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mut orch = Orchestrator::with_options(
        OrchestratorOptions {
            grace_period: Duration::from_secs(1),
            fail_fast: false,
        },
        OutputMultiplexer::new(buf.clone()),
    );
    // Far more than a pipe buffer: the child would block if nobody read it.
    orch.add_commands([
        silent_spec("noisy", "seq 1 200000; seq 1 50000 1>&2"),
        spec("loud", "echo visible"),
    ]);

    let result = with_timeout(orch.run_commands()).await;

    assert!(!result.any_failed);
    assert_eq!(buf.text(), "[loud] visible\n");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn trailing_partial_line_is_flushed() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mut orch = Orchestrator::with_options(
        OrchestratorOptions::default(),
        OutputMultiplexer::new(buf.clone()),
    );
    orch.add_commands([spec("p", "printf 'first\\nno newline at end'")]);

    with_timeout(orch.run_commands()).await;

    assert_eq!(buf.text(), "[p] first\n[p] no newline at end\n");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn stdout_and_stderr_share_the_prefix() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mut orch = Orchestrator::with_options(
        OrchestratorOptions::default(),
        OutputMultiplexer::new(buf.clone()),
    );
    orch.add_commands([spec("both", "echo to-out; echo to-err 1>&2")]);

    with_timeout(orch.run_commands()).await;

    let mut lines = buf.lines();
    lines.sort();
    assert_eq!(lines, vec!["[both] to-err", "[both] to-out"]);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn unnamed_command_output_is_passed_through_unchanged() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mut orch = Orchestrator::with_options(
        OrchestratorOptions::default(),
        OutputMultiplexer::new(buf.clone()),
    );
    orch.add_commands([spec("", "printf 'token ready\\nPassword: '")]);

    with_timeout(orch.run_commands()).await;

    assert_eq!(buf.contents(), b"token ready\nPassword: ");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn long_line_from_named_command_keeps_one_prefix() -> TestResult {
    init_tracing();

    let buf = SharedBuffer::new();
    let mut orch = Orchestrator::with_options(
        OrchestratorOptions::default(),
        OutputMultiplexer::new(buf.clone()),
    );
    // 100 KiB of 'a' on a single line.
    orch.add_commands([spec("a", "head -c 102400 /dev/zero | tr '\\0' a; echo")]);

    with_timeout(orch.run_commands()).await;

    let lines = buf.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].len(), "[a] ".len() + 102_400);
    assert!(lines[0].starts_with("[a] aaaa"));
    Ok(())
}
