//! State-change flags and the per-kind effectiveness predicate.

use gaia_core_types::{ActionKind, StateChange};

use crate::evidence::{PageEvidence, TargetState};

fn sorted_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.truncate(100);
    out
}

/// Inputs to one flag computation.
pub struct ChangeInputs<'a> {
    pub kind: ActionKind,
    pub expected_value: Option<&'a str>,
    pub before_url: &'a str,
    pub after_url: &'a str,
    pub before_dom_hash: &'a str,
    pub after_dom_hash: &'a str,
    pub before_evidence: &'a PageEvidence,
    pub after_evidence: &'a PageEvidence,
    pub before_target: &'a TargetState,
    pub after_target: &'a TargetState,
    pub before_focus: &'a str,
    pub after_focus: &'a str,
}

/// Compute the change flags and the kind-specific effectiveness verdict.
pub fn compute_state_change(inputs: &ChangeInputs<'_>) -> (StateChange, bool) {
    let before = inputs.before_evidence;
    let after = inputs.after_evidence;

    let target_value_matches = match (inputs.expected_value, &inputs.after_target.value) {
        (Some(expected), Some(actual)) => actual == expected,
        _ => false,
    };

    let mut change = StateChange {
        url_changed: inputs.before_url != inputs.after_url,
        dom_changed: inputs.before_dom_hash != inputs.after_dom_hash,
        target_visibility_changed: inputs.before_target.visible != inputs.after_target.visible,
        target_value_changed: inputs.before_target.value != inputs.after_target.value,
        target_value_matches,
        target_focus_changed: inputs.before_target.focused != inputs.after_target.focused,
        focus_changed: inputs.before_focus != inputs.after_focus,
        counter_changed: sorted_list(&before.counters) != sorted_list(&after.counters),
        number_tokens_changed: sorted_list(&before.number_tokens)
            != sorted_list(&after.number_tokens),
        status_text_changed: sorted_list(&before.live_texts) != sorted_list(&after.live_texts),
        list_count_changed: before.list_count != after.list_count,
        interactive_count_changed: before.interactive_count != after.interactive_count,
        auth_state_changed: before.login_visible != after.login_visible
            || before.logout_visible != after.logout_visible,
        text_digest_changed: before.text_digest != after.text_digest,
        evidence_changed: false,
        probe_wait_ms: 0,
        probe_scroll: Default::default(),
        live_texts_after: Vec::new(),
    };
    change.evidence_changed = change.counter_changed
        || change.number_tokens_changed
        || change.status_text_changed
        || change.list_count_changed
        || change.interactive_count_changed
        || change.auth_state_changed
        || change.text_digest_changed;

    let effective = match inputs.kind {
        ActionKind::Fill => {
            change.target_value_changed || change.target_value_matches || change.evidence_changed
        }
        ActionKind::Click => {
            change.url_changed
                || change.dom_changed
                || change.target_visibility_changed
                || change.evidence_changed
        }
        ActionKind::Press => {
            change.url_changed
                || change.dom_changed
                || change.focus_changed
                || change.target_focus_changed
                || change.evidence_changed
        }
        ActionKind::Hover => {
            change.target_visibility_changed
                || change.focus_changed
                || change.dom_changed
                || change.evidence_changed
        }
        // Remaining kinds count as effective on transport success.
        _ => true,
    };

    (change, effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(
        kind: ActionKind,
        before: &'a PageEvidence,
        after: &'a PageEvidence,
        before_target: &'a TargetState,
        after_target: &'a TargetState,
    ) -> ChangeInputs<'a> {
        ChangeInputs {
            kind,
            expected_value: None,
            before_url: "https://a.test",
            after_url: "https://a.test",
            before_dom_hash: "h1",
            after_dom_hash: "h1",
            before_evidence: before,
            after_evidence: after,
            before_target,
            after_target,
            before_focus: "body",
            after_focus: "body",
        }
    }

    #[test]
    fn noop_click_is_not_effective() {
        let ev = PageEvidence::default();
        let target = TargetState::default();
        let (change, effective) = compute_state_change(&inputs(
            ActionKind::Click,
            &ev,
            &ev,
            &target,
            &target,
        ));
        assert!(!effective);
        assert!(!change.any());
    }

    #[test]
    fn url_change_makes_click_effective() {
        let ev = PageEvidence::default();
        let target = TargetState::default();
        let mut i = inputs(ActionKind::Click, &ev, &ev, &target, &target);
        i.after_url = "https://a.test/next";
        let (change, effective) = compute_state_change(&i);
        assert!(effective);
        assert!(change.url_changed);
    }

    #[test]
    fn fill_is_effective_when_value_matches_expected() {
        let ev = PageEvidence::default();
        let before_target = TargetState {
            found: true,
            visible: true,
            value: Some(String::new()),
            focused: true,
        };
        let after_target = TargetState {
            value: Some("user@example.test".to_string()),
            ..before_target.clone()
        };
        let mut i = inputs(ActionKind::Fill, &ev, &ev, &before_target, &after_target);
        i.expected_value = Some("user@example.test");
        let (change, effective) = compute_state_change(&i);
        assert!(effective);
        assert!(change.target_value_changed);
        assert!(change.target_value_matches);
    }

    #[test]
    fn fill_ignores_url_only_changes() {
        let ev = PageEvidence::default();
        let target = TargetState::default();
        let mut i = inputs(ActionKind::Fill, &ev, &ev, &target, &target);
        i.after_url = "https://a.test/elsewhere";
        let (_, effective) = compute_state_change(&i);
        assert!(!effective);
    }

    #[test]
    fn press_counts_focus_movement() {
        let ev = PageEvidence::default();
        let target = TargetState::default();
        let mut i = inputs(ActionKind::Press, &ev, &ev, &target, &target);
        i.after_focus = "input|email||gaia-input-x-3";
        let (change, effective) = compute_state_change(&i);
        assert!(effective);
        assert!(change.focus_changed);
    }

    #[test]
    fn evidence_flags_roll_up_into_evidence_changed() {
        let before = PageEvidence {
            counters: vec!["3".into()],
            ..Default::default()
        };
        let after = PageEvidence {
            counters: vec!["4".into()],
            ..Default::default()
        };
        let target = TargetState::default();
        let (change, effective) = compute_state_change(&inputs(
            ActionKind::Click,
            &before,
            &after,
            &target,
            &target,
        ));
        assert!(change.counter_changed);
        assert!(change.evidence_changed);
        assert!(effective);
    }

    #[test]
    fn counter_comparison_ignores_order() {
        let before = PageEvidence {
            counters: vec!["b".into(), "a".into()],
            ..Default::default()
        };
        let after = PageEvidence {
            counters: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let target = TargetState::default();
        let (change, _) = compute_state_change(&inputs(
            ActionKind::Click,
            &before,
            &after,
            &target,
            &target,
        ));
        assert!(!change.counter_changed);
    }

    #[test]
    fn scroll_is_effective_on_transport() {
        let ev = PageEvidence::default();
        let target = TargetState::default();
        let (_, effective) = compute_state_change(&inputs(
            ActionKind::Scroll,
            &ev,
            &ev,
            &target,
            &target,
        ));
        assert!(effective);
    }
}
