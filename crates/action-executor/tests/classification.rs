//! Effectiveness classification and stale-rescue behavior over the pure
//! executor layers.

use std::collections::{BTreeMap, HashMap};

use action_executor::evidence::{PageEvidence, TargetState};
use action_executor::executor::is_submit_like;
use action_executor::flags::{compute_state_change, ChangeInputs};
use action_executor::{initial_ref_state, rescue_stale_ref, RefState};
use gaia_core_types::{
    ActionKind, BoundingBox, ElementMeta, ElementScope, ElementType, RefId, Snapshot, SnapshotId,
};

fn element(idx: usize, dom_ref: &str, text: &str, attrs: &[(&str, &str)]) -> ElementMeta {
    let attributes: BTreeMap<String, String> = attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ElementMeta {
        ref_id: RefId::compose(0, 0, idx),
        dom_ref: dom_ref.to_string(),
        tag: "button".into(),
        text: text.into(),
        selector: format!("#el-{idx}"),
        full_selector: format!("#el-{idx}"),
        frame_name: String::new(),
        attributes,
        bounding_box: BoundingBox {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
            center_x: 20.0,
            center_y: 20.0,
        },
        element_type: ElementType::Button,
        scope: ElementScope {
            tab_index: 0,
            frame_index: 0,
            is_main_frame: true,
        },
    }
}

fn snapshot(epoch: u64, elements: Vec<ElementMeta>) -> Snapshot {
    let hash = format!("{epoch:064x}");
    let element_order: Vec<RefId> = elements.iter().map(|m| m.ref_id.clone()).collect();
    let elements_by_ref: HashMap<RefId, ElementMeta> = elements
        .into_iter()
        .map(|m| (m.ref_id.clone(), m))
        .collect();
    Snapshot {
        snapshot_id: SnapshotId::compose("s1", epoch, &hash),
        session_id: "s1".into(),
        url: "https://example.test".into(),
        tab_index: 0,
        dom_hash: hash,
        epoch,
        captured_at: 0,
        element_order,
        elements_by_ref,
    }
}

fn change_inputs<'a>(
    kind: ActionKind,
    before: &'a PageEvidence,
    after: &'a PageEvidence,
    target: &'a TargetState,
) -> ChangeInputs<'a> {
    ChangeInputs {
        kind,
        expected_value: None,
        before_url: "https://example.test/login",
        after_url: "https://example.test/login",
        before_dom_hash: "h",
        after_dom_hash: "h",
        before_evidence: before,
        after_evidence: after,
        before_target: target,
        after_target: target,
        before_focus: "body",
        after_focus: "body",
    }
}

#[test]
fn every_verified_success_sets_at_least_one_flag() {
    // Effectiveness implies some change: mutate each evidence channel in
    // turn and confirm the predicate only fires alongside a flag.
    let base = PageEvidence::default();
    let target = TargetState::default();

    let variants: Vec<PageEvidence> = vec![
        PageEvidence { text_digest: "changed".into(), ..base.clone() },
        PageEvidence { counters: vec!["1".into()], ..base.clone() },
        PageEvidence { list_count: 5, ..base.clone() },
        PageEvidence { interactive_count: 9, ..base.clone() },
        PageEvidence { login_visible: true, ..base.clone() },
        PageEvidence { live_texts: vec!["saved".into()], ..base.clone() },
    ];
    for after in &variants {
        let (change, effective) =
            compute_state_change(&change_inputs(ActionKind::Click, &base, after, &target));
        assert!(effective);
        assert!(change.any(), "effective without any flag: {change:?}");
    }
}

#[test]
fn hover_needs_more_than_evidence_noise_free_channels() {
    let base = PageEvidence::default();
    let target = TargetState::default();
    let (change, effective) =
        compute_state_change(&change_inputs(ActionKind::Hover, &base, &base, &target));
    assert!(!effective);
    assert!(!change.evidence_changed);
}

#[test]
fn stale_epoch_recovers_via_dom_ref_then_similarity() {
    let old = element(0, "gaia-button-a-0", "Pay now", &[]);
    let stale_snapshot_id = SnapshotId::compose("s1", 1, &format!("{:064x}", 1u64));

    // Fresh snapshot keeps the same dom-ref: exact rematch.
    let fresh = snapshot(2, vec![element(0, "gaia-button-a-0", "Pay now", &[])]);
    assert_eq!(
        initial_ref_state(&stale_snapshot_id, Some(&fresh), &RefId::compose(0, 0, 0), 0),
        Some(RefState::Stale)
    );
    assert!(rescue_stale_ref(Some(&old), &fresh).is_some());

    // Re-stamped dom-refs still rescue through the similarity score.
    let restamped = snapshot(3, vec![element(0, "gaia-button-b-7", "Pay now", &[])]);
    let hit = rescue_stale_ref(Some(&old), &restamped).unwrap();
    assert_eq!(hit.dom_ref, "gaia-button-b-7");
}

#[test]
fn submit_detection_covers_type_and_lexicon() {
    assert!(is_submit_like(
        ActionKind::Click,
        &element(0, "r", "Go", &[("type", "submit")])
    ));
    assert!(is_submit_like(ActionKind::Click, &element(0, "r", "Log In", &[])));
    assert!(is_submit_like(ActionKind::Click, &element(0, "r", "Sign Up Free", &[])));
    assert!(!is_submit_like(ActionKind::Click, &element(0, "r", "Learn more", &[])));
    assert!(!is_submit_like(ActionKind::Press, &element(0, "r", "Log In", &[])));
}
