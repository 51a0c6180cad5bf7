//! Structured action outcomes.

use serde::{Deserialize, Serialize};

use crate::reason::ReasonCode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeScroll {
    #[default]
    None,
    Top,
    Mid,
    Bottom,
}

/// Change flags computed from before/after page evidence.
///
/// `evidence_changed` is the disjunction of the evidence-level flags; the
/// kind-specific effectiveness predicate lives with the executor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub url_changed: bool,
    pub dom_changed: bool,
    pub target_visibility_changed: bool,
    pub target_value_changed: bool,
    pub target_value_matches: bool,
    pub target_focus_changed: bool,
    pub focus_changed: bool,
    pub counter_changed: bool,
    pub number_tokens_changed: bool,
    pub status_text_changed: bool,
    pub list_count_changed: bool,
    pub interactive_count_changed: bool,
    pub auth_state_changed: bool,
    pub text_digest_changed: bool,
    pub evidence_changed: bool,
    /// Which probe wait observed the change (ms).
    pub probe_wait_ms: u64,
    pub probe_scroll: ProbeScroll,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub live_texts_after: Vec<String>,
}

impl StateChange {
    /// True when at least one observable flag fired.
    pub fn any(&self) -> bool {
        self.url_changed
            || self.dom_changed
            || self.target_visibility_changed
            || self.target_value_changed
            || self.target_value_matches
            || self.target_focus_changed
            || self.focus_changed
            || self.evidence_changed
    }
}

/// One locator attempt inside an action, with its own classification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptLog {
    pub attempt: usize,
    /// Candidate mode, currently always `dom_ref`.
    pub mode: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_index: Option<usize>,
    pub reason_code: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_change: Option<StateChange>,
}

/// Structured outcome of one action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub effective: bool,
    pub reason_code: ReasonCode,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id_used: Option<String>,
    pub stale_recovered: bool,
    pub transport_success: bool,
    pub locator_found: bool,
    pub interaction_success: bool,
    pub state_change: StateChange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub live_texts: Vec<String>,
    pub retry_path: Vec<String>,
    pub attempt_count: usize,
    pub attempt_logs: Vec<AttemptLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub current_url: String,
    #[serde(default)]
    pub tab_id: usize,
}

impl ActionResult {
    pub fn failure(reason_code: ReasonCode, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            effective: false,
            reason_code,
            reason: reason.into(),
            snapshot_id_used: None,
            ref_id_used: None,
            stale_recovered: false,
            transport_success: false,
            locator_found: false,
            interaction_success: false,
            state_change: StateChange::default(),
            live_texts: Vec::new(),
            retry_path: Vec::new(),
            attempt_count: 0,
            attempt_logs: Vec::new(),
            screenshot: None,
            current_url: String::new(),
            tab_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_change_reports_nothing() {
        assert!(!StateChange::default().any());
    }

    #[test]
    fn failure_carries_reason_code() {
        let res = ActionResult::failure(ReasonCode::StaleSnapshot, "stale");
        assert!(!res.success);
        assert!(!res.effective);
        assert_eq!(res.reason_code, ReasonCode::StaleSnapshot);
    }
}
