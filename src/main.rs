// src/main.rs

use muxterm::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("muxterm error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when at least one command failed.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let outcome = run(args).await?;
    Ok(outcome.is_none_or(|result| !result.any_failed))
}
