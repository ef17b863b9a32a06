use std::fmt;

use serde::Serialize;

/// Classification of a single probed candidate.
///
/// `Buyable` and `Claimed` are the actionable statuses: the sequential
/// prober halts at the first candidate carrying one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No element matched the probe selector.
    NotFound,
    /// Enabled element pointing at the confirmation flow with a purchase label.
    Buyable,
    /// Disabled element, or a label carrying the sold-out marker.
    SoldOut,
    /// An element was present but matched no rule.
    Unknown,
    /// The claim action was attempted and did not reach confirmation in time.
    ClickFailed,
    /// The claim action landed on the confirmation flow.
    Claimed,
}

impl Status {
    /// Stable token used in the run log and the JSON report.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotFound => "not_found",
            Status::Buyable => "buyable",
            Status::SoldOut => "sold_out",
            Status::Unknown => "unknown",
            Status::ClickFailed => "click_failed",
            Status::Claimed => "claimed",
        }
    }

    /// Whether this status halts the sequential prober.
    pub fn is_actionable(self) -> bool {
        matches!(self, Status::Buyable | Status::Claimed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
