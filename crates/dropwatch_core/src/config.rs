use std::path::PathBuf;

use serde::Deserialize;

use crate::Markers;

/// Default cap on the number of candidates probed per run.
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Everything one armed run needs.
///
/// Constructed once at startup and passed by reference into the scheduler
/// and prober; never read from ambient global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL relative candidate hrefs are resolved against.
    pub base_url: String,
    pub target: TargetConfig,
    /// Cap on the ranked candidate list; clamped to at least 1.
    pub max_candidates: usize,
    pub navigation_timeout_ms: u64,
    /// Budget for the claim action to reach the confirmation flow.
    pub action_timeout_ms: u64,
    /// False keeps dry-run semantics: classification still happens, the
    /// claim action is never attempted.
    pub allow_action: bool,
    /// Resource-type hints forwarded to the driver; no core-logic effect.
    pub block_resources: Vec<String>,
    pub log_path: PathBuf,
    /// Stored-session file materialized into the driver before the run.
    pub session_path: PathBuf,
    pub auto_login: bool,
    pub login_email: Option<String>,
    pub login_password: Option<String>,
    pub markers: Markers,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "https://only-five.jp".to_string(),
            target: TargetConfig::default(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            navigation_timeout_ms: 2_000,
            action_timeout_ms: 1_500,
            allow_action: false,
            block_resources: Vec::new(),
            log_path: PathBuf::from("logs/status.csv"),
            session_path: PathBuf::from("auth.json"),
            auto_login: false,
            login_email: None,
            login_password: None,
            markers: Markers::default(),
        }
    }
}

impl RunConfig {
    /// Applies bounds to deserialized values.
    pub fn normalized(mut self) -> Self {
        self.max_candidates = self.max_candidates.max(1);
        self
    }
}

/// The listing being raced and the selectors that describe it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Label recorded with every run-log row.
    pub name: String,
    pub listing_url: String,
    /// Regex for the raw listing scan; the first capture group is the href.
    pub link_pattern: String,
    /// CSS selector for the DOM fallback enumeration.
    pub link_selector: String,
    /// CSS selector for the element the classifier inspects.
    pub buy_selector: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: "target".to_string(),
            listing_url: String::new(),
            link_pattern: r#"href="(/posts/\d+)""#.to_string(),
            link_selector: "a[href^='/posts/']".to_string(),
            buy_selector: "a.buy-button".to_string(),
        }
    }
}
