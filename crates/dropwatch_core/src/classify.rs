use serde::Deserialize;

use crate::Status;

/// Snapshot of the first element matching the probe selector on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementFacts {
    /// Visible text, trimmed and flattened to one line.
    pub label: String,
    /// Raw `class` attribute.
    pub style_class: String,
    /// Raw `href` attribute.
    pub action_target: String,
}

impl ElementFacts {
    fn is_disabled(&self, markers: &Markers) -> bool {
        self.style_class.contains(&markers.disabled_marker)
    }
}

/// Site-specific strings driving the classifier decision table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Substring of the action target that identifies the confirmation flow.
    pub confirm_pattern: String,
    /// Substring of the label that identifies a purchase action.
    pub purchase_marker: String,
    /// Substring of the label that identifies a sold-out candidate.
    pub sold_out_marker: String,
    /// Substring of the style class that marks the element disabled.
    pub disabled_marker: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            confirm_pattern: "charge_confirmation".to_string(),
            purchase_marker: "購入".to_string(),
            sold_out_marker: "売り切れ".to_string(),
            disabled_marker: "disabled".to_string(),
        }
    }
}

/// Deterministic status assignment for one probed page.
///
/// The rule order is load-bearing: a disabled element is `SoldOut` no matter
/// what its label says, and a purchase label alone never makes a candidate
/// `Buyable` without the confirmation action target.
pub fn classify(element: Option<&ElementFacts>, markers: &Markers) -> Status {
    let Some(facts) = element else {
        return Status::NotFound;
    };
    if !facts.is_disabled(markers)
        && facts.action_target.contains(&markers.confirm_pattern)
        && facts.label.contains(&markers.purchase_marker)
    {
        Status::Buyable
    } else if facts.is_disabled(markers) || facts.label.contains(&markers.sold_out_marker) {
        Status::SoldOut
    } else {
        Status::Unknown
    }
}
