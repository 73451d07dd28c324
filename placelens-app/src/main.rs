use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use placelens_common::observability::init_logging;
use placelens_runtime::PlacelensRuntime;

mod analyze;
mod cli;
mod commands;
mod rank;
mod scrape;
mod table;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // 1) Config (env wins), then logging from its `logging` section
    let cfg = commands::load_config(cli.config.as_deref())?;
    let log_path = init_logging(commands::log_config(&cfg.logging, cli.verbose))?;
    tracing::debug!(log=%log_path.display(), "placelens.start");

    // 2) Runtime with Ctrl-C wired to the shared cancellation token
    let runtime = PlacelensRuntime::build("placelens", None)?;
    let handle = runtime.handle();
    let _ctrl_c = handle.cancel_on_ctrl_c();
    let cancel = handle.cancellation().as_ref().clone();

    let outcome = runtime.block_on(commands::run(cli.command, cfg, cancel));
    runtime.shutdown(Duration::from_secs(2));

    if let Err(e) = &outcome {
        tracing::error!(error=%format!("{e:#}"), "placelens.failed");
    }
    outcome
}
