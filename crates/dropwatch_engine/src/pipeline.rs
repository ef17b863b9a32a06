use std::time::{Duration, Instant};

use dropwatch_core::{RunConfig, RunResult};
use scraper::Selector;
use thiserror::Error;
use watch_logging::{watch_info, watch_warn};

use crate::deadline::CancelToken;
use crate::driver::{DriverError, DriverSettings, HttpDriver, PageDriver};
use crate::probe::{ProbeSettings, Prober};
use crate::resolve::{resolve_candidates, ListingScan, ScanConfigError};
use crate::run_log::{RunLog, RunLogError};
use crate::session::{login_wall_present, try_auto_login, SessionStore};

/// A failure before the first candidate probe; the run never starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Listing(#[from] ScanConfigError),
    #[error("invalid buy selector {0:?}")]
    BuySelector(String),
    #[error("driver setup failed: {0}")]
    Driver(DriverError),
    #[error("run log unavailable: {0}")]
    Log(#[from] RunLogError),
    #[error("auto-login failed")]
    AutoLogin,
}

/// Everything assembled before the deadline, so the post-deadline path runs
/// nothing but resolution and probing.
pub struct PreparedRun {
    driver: HttpDriver,
    log: RunLog,
    scan: ListingScan,
    probe: ProbeSettings,
    max_candidates: usize,
}

/// Builds the driver, materializes the stored session, opens the run log,
/// and primes the listing. Called before `wait_until`.
pub async fn prepare_run(config: &RunConfig) -> Result<PreparedRun, SetupError> {
    let scan = ListingScan::compile(&config.base_url, &config.target)?;
    let buy_selector = Selector::parse(&config.target.buy_selector)
        .map_err(|_| SetupError::BuySelector(config.target.buy_selector.clone()))?;

    let settings = DriverSettings {
        blocked_resources: config.block_resources.clone(),
        ..DriverSettings::default()
    };
    let driver = HttpDriver::new(settings).map_err(SetupError::Driver)?;

    let store = SessionStore::new(&config.session_path);
    let applied = store.materialize(&driver);
    if applied > 0 {
        watch_info!("materialized {applied} stored session cookies");
    }

    let log = RunLog::open(&config.log_path, &config.target.name)?;

    let navigation_timeout = Duration::from_millis(config.navigation_timeout_ms);
    match driver.navigate(&scan.listing_url, navigation_timeout).await {
        Ok(page) => {
            if login_wall_present(&page.body) {
                authenticate(config, &driver, &store, &scan, navigation_timeout).await?;
            }
        }
        // The prime is a warm-up; resolution retries the listing at the
        // deadline either way.
        Err(err) => watch_warn!("listing prime failed: {err}"),
    }

    let probe = ProbeSettings {
        markers: config.markers.clone(),
        buy_selector,
        navigation_timeout,
        action_timeout: Duration::from_millis(config.action_timeout_ms),
        allow_action: config.allow_action,
    };

    Ok(PreparedRun {
        driver,
        log,
        scan,
        probe,
        max_candidates: config.max_candidates,
    })
}

async fn authenticate(
    config: &RunConfig,
    driver: &HttpDriver,
    store: &SessionStore,
    scan: &ListingScan,
    timeout: Duration,
) -> Result<(), SetupError> {
    if !config.auto_login {
        watch_warn!("listing shows a login wall and auto-login is disabled");
        return Ok(());
    }
    let (Some(email), Some(password)) = (&config.login_email, &config.login_password) else {
        return Err(SetupError::AutoLogin);
    };
    let ok = try_auto_login(driver, store, scan.base(), email, password, timeout)
        .await
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(SetupError::AutoLogin)
    }
}

impl PreparedRun {
    /// The post-deadline path: capture the epoch, resolve the ranked
    /// candidates, probe them in order.
    pub async fn execute(mut self, cancel: &CancelToken) -> RunResult {
        let epoch = Instant::now();
        let timeout = self.probe.navigation_timeout;
        let candidates =
            match resolve_candidates(&self.driver, &self.scan, self.max_candidates, timeout).await
            {
                Ok(candidates) => candidates,
                Err(err) => return RunResult::error(err.to_string()),
            };
        if candidates.is_empty() {
            watch_info!("listing resolved to zero candidates");
            return RunResult::none(0);
        }

        let mut prober = Prober::new(&self.driver, &mut self.log, &self.probe);
        prober.run(&candidates, epoch, cancel).await
    }
}
