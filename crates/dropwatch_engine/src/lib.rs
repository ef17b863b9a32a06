//! Dropwatch engine: deadline scheduling, probing IO, and run persistence.
mod deadline;
mod driver;
mod inspect;
mod pipeline;
mod probe;
mod resolve;
mod run_log;
mod session;
mod worker;

pub use deadline::{truncate_to_minute, wait_until, CancelToken, WaitOutcome};
pub use driver::{
    DriverError, DriverFailure, DriverSettings, FormResponse, HttpDriver, PageDriver, PageView,
};
pub use inspect::find_element;
pub use pipeline::{prepare_run, PreparedRun, SetupError};
pub use probe::{ProbeSettings, Prober};
pub use resolve::{resolve_candidates, ListingScan, ResolveError, ScanConfigError};
pub use run_log::{RunLog, RunLogError, LOG_COLUMNS};
pub use session::{login_wall_present, try_auto_login, SessionStore};
pub use worker::{WatchHandle, WorkerEvent};
