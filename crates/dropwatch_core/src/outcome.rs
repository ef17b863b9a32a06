use serde::{Serialize, Serializer};

use crate::{Candidate, Status};

/// Result of probing one candidate.
///
/// Created once per attempt, never mutated afterwards, and appended to the
/// run log exactly once (failed attempts included).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub candidate: Candidate,
    pub status: Status,
    /// Label text of the inspected element, empty when absent.
    pub label: String,
    /// Style class of the inspected element, empty when absent.
    pub style_class: String,
    /// Action target of the inspected element, empty when absent.
    pub action_target: String,
    /// Milliseconds since the run epoch, immune to wall-clock adjustments.
    pub elapsed_ms: f64,
    /// Free-form error note for recovered failures, empty otherwise.
    pub note: String,
}

/// Aggregate verdict of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    /// An actionable status halted the prober.
    Found(Status),
    /// Every candidate was probed without an actionable status.
    Nothing,
    /// Resolution or setup failed before the run could complete normally.
    Error,
}

impl RunVerdict {
    /// Stable token used in the JSON report.
    pub fn as_str(self) -> &'static str {
        match self {
            RunVerdict::Found(status) => status.as_str(),
            RunVerdict::Nothing => "none",
            RunVerdict::Error => "error",
        }
    }
}

impl Serialize for RunVerdict {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// The sole value a run reports back to its caller.
///
/// Built only through the constructors below, which keep the invariant that
/// `winner` is set exactly when `found` carries an actionable status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub finished: bool,
    pub found: RunVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<ProbeOutcome>,
    /// Number of candidates actually probed, in rank order.
    pub checked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_note: Option<String>,
}

impl RunResult {
    /// A run halted by an actionable outcome at the `checked`-th candidate.
    pub fn winner(outcome: ProbeOutcome, checked: usize) -> Self {
        debug_assert!(outcome.status.is_actionable());
        Self {
            finished: true,
            found: RunVerdict::Found(outcome.status),
            winner: Some(outcome),
            checked,
            error_note: None,
        }
    }

    /// A run that exhausted (or was told to stop probing) its candidates.
    pub fn none(checked: usize) -> Self {
        Self {
            finished: true,
            found: RunVerdict::Nothing,
            winner: None,
            checked,
            error_note: None,
        }
    }

    /// Like [`RunResult::none`], with an explanatory note.
    pub fn none_with_note(checked: usize, note: impl Into<String>) -> Self {
        Self {
            error_note: Some(note.into()),
            ..Self::none(checked)
        }
    }

    /// A run aborted before any candidate was probed.
    pub fn error(note: impl Into<String>) -> Self {
        Self {
            finished: true,
            found: RunVerdict::Error,
            winner: None,
            checked: 0,
            error_note: Some(note.into()),
        }
    }
}
