use std::sync::mpsc;
use std::thread;
use std::time::SystemTime;

use dropwatch_core::{RunConfig, RunResult};

use crate::deadline::{truncate_to_minute, wait_until, CancelToken, WaitOutcome};
use crate::pipeline::prepare_run;

enum WorkerCommand {
    Arm {
        config: Box<RunConfig>,
        target: SystemTime,
    },
}

/// Messages from the worker to the foreground, drained non-blockingly so the
/// worker never waits on a consumer.
#[derive(Debug)]
pub enum WorkerEvent {
    Info(String),
    /// The scheduler is suspended until the (minute-truncated) instant.
    Waiting { fires_at: SystemTime },
    Running(bool),
    Finished(RunResult),
}

/// Handle to the background worker that owns the scheduler → resolver →
/// prober pipeline. One run is in flight at a time against one log target;
/// further commands queue behind it.
pub struct WatchHandle {
    cmd_tx: mpsc::Sender<WorkerCommand>,
    event_rx: mpsc::Receiver<WorkerEvent>,
    cancel: CancelToken,
}

impl WatchHandle {
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    WorkerCommand::Arm { config, target } => {
                        run_armed(&runtime, *config, target, &worker_cancel, &event_tx);
                    }
                }
            }
        });

        Self {
            cmd_tx,
            event_rx,
            cancel,
        }
    }

    /// Schedules one run at `target` (truncated to its minute boundary).
    pub fn arm(&self, config: RunConfig, target: SystemTime) {
        let _ = self.cmd_tx.send(WorkerCommand::Arm {
            config: Box::new(config),
            target,
        });
    }

    /// Trips the cancellation signal observed by the scheduler's sleep loop
    /// and by the prober before each candidate.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn try_recv(&self) -> Option<WorkerEvent> {
        self.event_rx.try_recv().ok()
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn run_armed(
    runtime: &tokio::runtime::Runtime,
    config: RunConfig,
    target: SystemTime,
    cancel: &CancelToken,
    events: &mpsc::Sender<WorkerEvent>,
) {
    let config = config.normalized();
    let prepared = match runtime.block_on(prepare_run(&config)) {
        Ok(prepared) => prepared,
        Err(err) => {
            let _ = events.send(WorkerEvent::Finished(RunResult::error(err.to_string())));
            return;
        }
    };

    let fires_at = truncate_to_minute(target);
    let _ = events.send(WorkerEvent::Waiting { fires_at });
    match wait_until(fires_at, cancel) {
        WaitOutcome::Cancelled => {
            let _ = events.send(WorkerEvent::Info(
                "run cancelled before the deadline".to_string(),
            ));
            let _ = events.send(WorkerEvent::Running(false));
        }
        WaitOutcome::Reached => {
            let _ = events.send(WorkerEvent::Running(true));
            let result = runtime.block_on(prepared.execute(cancel));
            let _ = events.send(WorkerEvent::Finished(result));
            let _ = events.send(WorkerEvent::Running(false));
        }
    }
}
