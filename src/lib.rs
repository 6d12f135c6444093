// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output;
pub mod types;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, CliCommand, SetRequest};
use crate::config::{
    default_config_dir, default_config_path, load_and_validate, load_command_sets,
    write_example_config, ConfigFile,
};
use crate::engine::{AggregateResult, InterruptHandle, Orchestrator, OrchestratorOptions};
use crate::output::OutputMultiplexer;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (a single file, or a named set from the config directory)
/// - the orchestrator and its output multiplexer
/// - Ctrl-C / SIGTERM handling
///
/// Returns `None` when nothing was run (`--dry-run`, `list`, `example`,
/// set help).
pub async fn run(args: CliArgs) -> Result<Option<AggregateResult>> {
    let cfg = match &args.command {
        Some(CliCommand::List) => {
            print_command_sets(&load_command_sets(config_dir(&args)?)?);
            return Ok(None);
        }
        Some(CliCommand::Example) => {
            let path = write_example_config(config_dir(&args)?)?;
            println!("wrote example command set to {}", path.display());
            return Ok(None);
        }
        Some(command @ CliCommand::Run(_)) => {
            if args.config.is_some() {
                bail!("--config cannot be combined with a command set name");
            }
            let request = command
                .set_request()
                .map_err(|e| anyhow!(e))?
                .ok_or_else(|| anyhow!("missing command set name"))?;
            let sets = load_command_sets(config_dir(&args)?)?;

            match request {
                SetRequest::Run(name) => find_set(sets, name)?,
                SetRequest::Help(name) => {
                    print_set_help(&find_set(sets, name)?);
                    return Ok(None);
                }
            }
        }
        None => {
            let config_path = args
                .config
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(default_config_path);
            load_and_validate(&config_path)?
        }
    };

    let options = effective_options(&cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg, &options);
        return Ok(None);
    }

    let mut orchestrator = Orchestrator::with_options(options, OutputMultiplexer::stdout());
    orchestrator.add_commands(cfg.command_specs());

    // Ctrl-C / SIGTERM -> drain the run; a second one kills outright.
    {
        let handle = orchestrator.interrupt_handle();
        tokio::spawn(forward_shutdown_signal(handle));
    }

    let result = orchestrator.run_commands().await;
    print_summary(&result);
    Ok(Some(result))
}

fn config_dir(args: &CliArgs) -> Result<PathBuf> {
    args.config_dir
        .as_deref()
        .map(PathBuf::from)
        .or_else(default_config_dir)
        .ok_or_else(|| anyhow!("cannot locate a config directory; pass --config-dir"))
}

/// Pick the set called `name`.
pub fn find_set(sets: Vec<ConfigFile>, name: &str) -> Result<ConfigFile> {
    let available: Vec<String> = sets.iter().map(|s| s.name.clone()).collect();
    sets.into_iter().find(|s| s.name == name).ok_or_else(|| {
        if available.is_empty() {
            anyhow!("no command set named '{name}'; run `muxterm example` to create one")
        } else {
            anyhow!(
                "no command set named '{name}' (available: {})",
                available.join(", ")
            )
        }
    })
}

/// Config options with CLI overrides applied.
fn effective_options(cfg: &ConfigFile, args: &CliArgs) -> OrchestratorOptions {
    let mut options = cfg.orchestrator_options();
    if let Some(grace) = args.grace_period {
        options.grace_period = grace;
    }
    if args.fail_fast {
        options.fail_fast = true;
    }
    options
}

async fn forward_shutdown_signal(handle: InterruptHandle) {
    if let Err(e) = wait_for_shutdown_signal().await {
        eprintln!("failed to listen for shutdown signals: {e}");
        return;
    }
    info!("shutdown signal received; stopping commands");
    if !handle.interrupt().await {
        debug!("run already finished when the signal arrived");
        return;
    }
    eprintln!("muxterm: stopping commands (interrupt again to kill them now)");

    if let Err(e) = wait_for_shutdown_signal().await {
        warn!(error = %e, "failed to listen for a second shutdown signal");
        return;
    }
    info!("second shutdown signal received; killing commands");
    if !handle.force_stop().await {
        debug!("run already finished when the second signal arrived");
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Report failed commands on stderr; stdout belongs to the commands.
fn print_summary(result: &AggregateResult) {
    if result.interrupted {
        eprintln!("muxterm: interrupted; all commands stopped");
    }
    for report in result.failures() {
        let name = if report.name.is_empty() {
            "<unnamed>"
        } else {
            report.name.as_str()
        };
        eprintln!("muxterm: {name}: {}", report.state);
    }
    if result.any_failed {
        warn!(
            failed = result.failures().count(),
            total = result.commands.len(),
            "run finished with failures"
        );
    }
}

/// `muxterm list`: one line per set with its short description.
fn print_command_sets(sets: &[ConfigFile]) {
    if sets.is_empty() {
        println!("no command sets found; run `muxterm example` to create one");
        return;
    }
    let width = sets.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for set in sets {
        println!("  {:width$}  {}", set.name, set.short);
    }
}

/// `muxterm <set> --help`.
fn print_set_help(set: &ConfigFile) {
    println!("{}", set.long.as_deref().unwrap_or(&set.short));
    println!();
    println!("Usage: muxterm [OPTIONS] {}", set.name);
    println!();
    println!("Commands ({}):", set.commands.len());
    for spec in set.command_specs() {
        println!("  - {}", spec.display_name());
    }
}

/// Simple dry-run output: print options and the resolved commands.
fn print_dry_run(cfg: &ConfigFile, options: &OrchestratorOptions) {
    println!("muxterm dry-run");
    if !cfg.name.is_empty() {
        println!("  set = {}", cfg.name);
    }
    if let Some(path) = &cfg.source {
        println!("  config = {}", path.display());
    }
    println!("  grace_period = {:?}", options.grace_period);
    println!("  fail_fast = {}", options.fail_fast);
    println!();

    let specs = cfg.command_specs();
    println!("commands ({}):", specs.len());
    for spec in &specs {
        println!("  - {}", spec.display_name());
        println!("      cmd: {}", spec.shell_text);
        if let Some(dir) = &spec.working_dir {
            println!("      directory: {dir}");
        }
        if spec.use_login_shell {
            println!("      shell: {} (login)", spec.shell);
        }
        if spec.silence {
            println!("      silence: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
