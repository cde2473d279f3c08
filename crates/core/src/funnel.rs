//! Funnel definitions and step matching.
//!
//! A funnel is an ordered step sequence authored by an operator; the
//! engine only consumes it. Matching and progression are pure functions
//! here so the tracker can be tested without storage.

use serde::{Deserialize, Serialize};

/// One stage in an ordered conversion sequence.
///
/// A step matches an event when every specified criterion equals the
/// event's corresponding field. A step with no criteria matches
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_label: Option<String>,
}

impl FunnelStep {
    pub fn matches(&self, action: Option<&str>, label: Option<&str>) -> bool {
        if self.event_action.is_none() && self.event_label.is_none() {
            return false;
        }
        let action_ok = match self.event_action.as_deref() {
            Some(want) => action == Some(want),
            None => true,
        };
        let label_ok = match self.event_label.as_deref() {
            Some(want) => label == Some(want),
            None => true,
        };
        action_ok && label_ok
    }
}

/// An operator-authored funnel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelDefinition {
    pub tenant_id: i64,
    pub funnel_id: i64,
    pub name: String,
    pub steps: Vec<FunnelStep>,
    pub conversion_goal: Option<String>,
}

impl FunnelDefinition {
    /// Index of the first step this event satisfies, if any.
    pub fn matching_step(&self, action: Option<&str>, label: Option<&str>) -> Option<usize> {
        self.steps.iter().position(|s| s.matches(action, label))
    }

    /// Index of the terminal step.
    pub fn terminal_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

/// Forward-only step progression for a single session.
///
/// Returns the new step index when the matched step advances the
/// session, `None` otherwise. A session enters at step 0 and then only
/// ever moves to the immediately next step; matches against earlier
/// steps (replays, page revisits) and skipped-ahead steps are ignored,
/// which keeps per-step daily counts non-increasing by construction.
pub fn advance(last_step: Option<usize>, matched_step: usize) -> Option<usize> {
    match last_step {
        None => (matched_step == 0).then_some(0),
        Some(current) => (matched_step == current + 1).then_some(matched_step),
    }
}
