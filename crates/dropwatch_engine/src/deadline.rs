use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Remaining wall-clock time above which the coarse sleep phase runs.
const COARSE_THRESHOLD: Duration = Duration::from_millis(1_500);
const COARSE_SLEEP_CAP: Duration = Duration::from_millis(250);
/// Below this the wait switches from 50ms sleeps to the final poll phase.
const FINE_THRESHOLD: Duration = Duration::from_millis(200);
const FINE_SLEEP: Duration = Duration::from_millis(50);
/// Poll interval of the final phase; also bounds cancellation latency.
const POLL_SLEEP: Duration = Duration::from_micros(500);

/// Cooperative cancellation flag shared between the foreground and the
/// worker. Checked at every scheduler sleep iteration and before each
/// candidate probe.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The target instant has been reached (or was already in the past).
    Reached,
    Cancelled,
}

/// Floors a wall-clock instant to its minute boundary.
///
/// Runs are scheduled on whole minutes; stray seconds in the configured
/// time are dropped rather than honored.
pub fn truncate_to_minute(target: SystemTime) -> SystemTime {
    match target.duration_since(UNIX_EPOCH) {
        Ok(since) => {
            let secs = since.as_secs();
            UNIX_EPOCH + Duration::from_secs(secs - secs % 60)
        }
        // A pre-epoch target is already long past; leave it alone.
        Err(_) => target,
    }
}

/// Suspends the calling thread until `target`, returning no earlier than the
/// instant itself. A target in the past returns immediately.
///
/// Three phases, each re-reading the clock so drift cannot accumulate:
/// capped 250ms sleeps while more than 1.5s remain, 50ms sleeps down to
/// 200ms, then the residual wall-clock delta is pinned to the monotonic
/// clock and polled in 500µs steps.
pub fn wait_until(target: SystemTime, cancel: &CancelToken) -> WaitOutcome {
    loop {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        let Some(remaining) = remaining_until(target) else {
            break;
        };
        if remaining <= COARSE_THRESHOLD {
            break;
        }
        thread::sleep((remaining - COARSE_THRESHOLD).min(COARSE_SLEEP_CAP));
    }

    loop {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        let Some(remaining) = remaining_until(target) else {
            break;
        };
        if remaining <= FINE_THRESHOLD {
            break;
        }
        thread::sleep(FINE_SLEEP);
    }

    let deadline = Instant::now() + remaining_until(target).unwrap_or(Duration::ZERO);
    while Instant::now() < deadline {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        thread::sleep(POLL_SLEEP);
    }
    WaitOutcome::Reached
}

fn remaining_until(target: SystemTime) -> Option<Duration> {
    target.duration_since(SystemTime::now()).ok()
}
