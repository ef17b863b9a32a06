//! Dropwatch CLI: arm a single deadline run and report its result.

mod config_file;
mod logging;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::Parser;
use dropwatch_core::RunResult;
use dropwatch_engine::{WatchHandle, WorkerEvent};
use watch_logging::watch_info;

#[derive(Debug, Parser)]
#[command(
    name = "dropwatch",
    about = "Race a listing for the first buyable candidate at a fixed deadline."
)]
struct Cli {
    /// Path to the YAML run configuration.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Ignore the configured drop time and fire immediately.
    #[arg(long)]
    now: bool,

    /// Also append logs to ./dropwatch.log.
    #[arg(long)]
    log_file: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(if cli.log_file {
        logging::LogDestination::Both
    } else {
        logging::LogDestination::Terminal
    });

    let loaded = config_file::load(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;
    let target = if cli.now {
        SystemTime::now()
    } else {
        loaded.drop_time()?
    };

    let handle = WatchHandle::new();
    handle.arm(loaded.run, target);

    let result = drain_until_finished(&handle);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Polls the worker's event channel without ever blocking it, logging
/// progress until the run result arrives.
fn drain_until_finished(handle: &WatchHandle) -> RunResult {
    loop {
        match handle.try_recv() {
            Some(WorkerEvent::Finished(result)) => return result,
            Some(WorkerEvent::Waiting { fires_at }) => {
                let local: DateTime<Local> = fires_at.into();
                watch_info!("waiting until {}", local.format("%Y-%m-%d %H:%M:%S"));
            }
            Some(WorkerEvent::Running(running)) => {
                watch_info!("running={running}");
            }
            Some(WorkerEvent::Info(text)) => {
                watch_info!("{text}");
            }
            None => thread::sleep(Duration::from_millis(20)),
        }
    }
}
