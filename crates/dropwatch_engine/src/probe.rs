use std::time::{Duration, Instant};

use dropwatch_core::{classify, Candidate, Markers, ProbeOutcome, RunResult, Status};
use scraper::Selector;
use url::Url;
use watch_logging::{watch_error, watch_info};

use crate::deadline::CancelToken;
use crate::driver::PageDriver;
use crate::inspect::find_element;
use crate::run_log::RunLog;

/// Knobs for one probing pass, derived from the run configuration.
pub struct ProbeSettings {
    pub markers: Markers,
    pub buy_selector: Selector,
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    /// False keeps dry-run semantics: `Buyable` is detected and reported but
    /// the claim action is never attempted.
    pub allow_action: bool,
}

/// Drives the classifier over resolved candidates in strict rank order
/// through one shared driver, persisting every outcome and stopping at the
/// first actionable status.
pub struct Prober<'a> {
    driver: &'a dyn PageDriver,
    log: &'a mut RunLog,
    settings: &'a ProbeSettings,
}

impl<'a> Prober<'a> {
    pub fn new(driver: &'a dyn PageDriver, log: &'a mut RunLog, settings: &'a ProbeSettings) -> Self {
        Self {
            driver,
            log,
            settings,
        }
    }

    pub async fn run(
        &mut self,
        candidates: &[Candidate],
        epoch: Instant,
        cancel: &CancelToken,
    ) -> RunResult {
        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return RunResult::none_with_note(
                    index,
                    format!("cancelled before rank {}", candidate.rank),
                );
            }

            let outcome = self.probe_one(candidate, epoch).await;
            self.persist(&outcome);
            watch_info!(
                "#{}/{} [{}] {} (+{:.1} ms)",
                candidate.rank,
                candidates.len(),
                outcome.status,
                candidate.identifier,
                outcome.elapsed_ms
            );

            if outcome.status.is_actionable() {
                return RunResult::winner(outcome, index + 1);
            }
        }
        RunResult::none(candidates.len())
    }

    async fn probe_one(&self, candidate: &Candidate, epoch: Instant) -> ProbeOutcome {
        let page = match self
            .driver
            .navigate(&candidate.identifier, self.settings.navigation_timeout)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                // Recovered locally: the loop moves on to the next rank.
                return ProbeOutcome {
                    candidate: candidate.clone(),
                    status: Status::Unknown,
                    label: String::new(),
                    style_class: String::new(),
                    action_target: String::new(),
                    elapsed_ms: elapsed_ms(epoch),
                    note: format!("navigation failed: {err}"),
                };
            }
        };

        let facts = find_element(&page.body, &self.settings.buy_selector);
        let mut status = classify(facts.as_ref(), &self.settings.markers);
        let mut note = String::new();
        if status == Status::Buyable && self.settings.allow_action {
            let target = facts
                .as_ref()
                .map(|f| f.action_target.as_str())
                .unwrap_or_default();
            (status, note) = self.attempt_claim(&page.final_url, target).await;
        }

        let facts = facts.unwrap_or_default();
        ProbeOutcome {
            candidate: candidate.clone(),
            status,
            label: facts.label,
            style_class: facts.style_class,
            action_target: facts.action_target,
            elapsed_ms: elapsed_ms(epoch),
            note,
        }
    }

    /// Follows the buy element's action target and awaits the confirmation
    /// flow. A failure downgrades to `ClickFailed`; the buyable detection
    /// itself already counted as a successful probe.
    async fn attempt_claim(&self, page_url: &str, action_target: &str) -> (Status, String) {
        let absolute = Url::parse(page_url)
            .ok()
            .and_then(|base| base.join(action_target).ok());
        let Some(absolute) = absolute else {
            return (
                Status::ClickFailed,
                format!("unresolvable action target: {action_target}"),
            );
        };

        match self
            .driver
            .navigate(absolute.as_str(), self.settings.action_timeout)
            .await
        {
            Ok(view) if view.final_url.contains(&self.settings.markers.confirm_pattern) => {
                (Status::Claimed, String::new())
            }
            Ok(view) => (
                Status::ClickFailed,
                format!("claim landed on {}", view.final_url),
            ),
            Err(err) => (Status::ClickFailed, format!("claim failed: {err}")),
        }
    }

    fn persist(&mut self, outcome: &ProbeOutcome) {
        // Losing one log row must not forfeit the race.
        if let Err(err) = self.log.append(outcome) {
            watch_error!("failed to append run log: {err}");
        }
    }
}

fn elapsed_ms(epoch: Instant) -> f64 {
    epoch.elapsed().as_secs_f64() * 1_000.0
}
