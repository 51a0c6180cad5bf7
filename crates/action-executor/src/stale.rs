//! Snapshot staleness detection and stale-ref rescue.
//!
//! A stale ref is rescued once per action: first by exact dom-ref rematch in
//! a fresh snapshot, then by weighted similarity over the element signature.

use gaia_core_types::{ElementMeta, RefId, Snapshot, SnapshotId};

/// Minimum similarity score for a rescue candidate to be accepted.
pub const RESCUE_ACCEPT_SCORE: i32 = 6;

/// Why the requested `(snapshot_id, ref_id)` cannot be used as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefState {
    SnapshotNotFound,
    RefNotFound,
    Stale,
}

fn norm(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Classify the requested snapshot/ref against the live session state.
/// `None` means the pair is usable as-is.
pub fn initial_ref_state(
    snapshot_id: &SnapshotId,
    snapshot: Option<&Snapshot>,
    ref_id: &RefId,
    current_tab_index: usize,
) -> Option<RefState> {
    let Some(snapshot) = snapshot else {
        return Some(RefState::SnapshotNotFound);
    };
    let Some(meta) = snapshot.element(ref_id) else {
        return Some(RefState::RefNotFound);
    };
    if meta.dom_ref.trim().is_empty() {
        return Some(RefState::Stale);
    }
    if let Some(parts) = snapshot_id.parse() {
        if parts.epoch != 0 && parts.epoch != snapshot.epoch {
            return Some(RefState::Stale);
        }
        if !parts.hash_prefix.is_empty()
            && !snapshot.dom_hash.is_empty()
            && !snapshot.dom_hash.starts_with(&parts.hash_prefix)
        {
            return Some(RefState::Stale);
        }
    }
    if snapshot.tab_index != current_tab_index {
        return Some(RefState::Stale);
    }
    None
}

/// Score similarity between a stale element and a fresh candidate.
fn similarity_score(old: &ElementMeta, candidate: &ElementMeta) -> i32 {
    let mut score = 0;

    let old_full = norm(&old.full_selector);
    let old_selector = norm(&old.selector);
    let old_text = norm(&old.text);
    let old_tag = norm(&old.tag);
    let old_role = norm(old.role().unwrap_or(""));

    let cand_full = norm(&candidate.full_selector);
    let cand_selector = norm(&candidate.selector);
    let cand_text = norm(&candidate.text);
    let cand_tag = norm(&candidate.tag);
    let cand_role = norm(candidate.role().unwrap_or(""));

    if !old_full.is_empty() && old_full == cand_full {
        score += 8;
    }
    if !old_selector.is_empty() && old_selector == cand_selector {
        score += 6;
    }
    if !old_tag.is_empty() && old_tag == cand_tag {
        score += 2;
    }
    if !old_text.is_empty() && old_text == cand_text {
        score += 3;
    }
    if !old_role.is_empty() && old_role == cand_role {
        score += 2;
    }
    if !old_text.is_empty() && !cand_text.is_empty() && cand_text.contains(&old_text) {
        score += 1;
    }
    if old.scope.frame_index == candidate.scope.frame_index {
        score += 4;
    }
    if old.scope.tab_index == candidate.scope.tab_index {
        score += 2;
    }

    let dist = old.bounding_box.center_distance_sq(&candidate.bounding_box);
    if dist <= 400.0 {
        score += 5;
    } else if dist <= 2500.0 {
        score += 3;
    } else if dist <= 10_000.0 {
        score += 1;
    }

    score
}

/// Locate the stale element in a fresh snapshot: exact dom-ref match first,
/// then the best similarity candidate at or above the acceptance score.
pub fn rescue_stale_ref<'a>(
    old_meta: Option<&ElementMeta>,
    fresh: &'a Snapshot,
) -> Option<&'a ElementMeta> {
    let old_meta = old_meta?;
    if fresh.elements_by_ref.is_empty() {
        return None;
    }

    if let Some(hit) = fresh.element_by_dom_ref(&old_meta.dom_ref) {
        return Some(hit);
    }

    let mut best: Option<(&ElementMeta, i32)> = None;
    for candidate in fresh.elements() {
        let score = similarity_score(old_meta, candidate);
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((candidate, score)),
        }
    }

    match best {
        Some((meta, score)) if score >= RESCUE_ACCEPT_SCORE => Some(meta),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_core_types::{
        BoundingBox, ElementScope, ElementType,
    };
    use std::collections::{BTreeMap, HashMap};

    fn element(idx: usize, dom_ref: &str, text: &str, cx: f64) -> ElementMeta {
        ElementMeta {
            ref_id: RefId::compose(0, 0, idx),
            dom_ref: dom_ref.to_string(),
            tag: "button".into(),
            text: text.into(),
            selector: format!("#btn-{idx}"),
            full_selector: format!("#btn-{idx}"),
            frame_name: String::new(),
            attributes: BTreeMap::new(),
            bounding_box: BoundingBox {
                x: cx - 10.0,
                y: 90.0,
                width: 20.0,
                height: 20.0,
                center_x: cx,
                center_y: 100.0,
            },
            element_type: ElementType::Button,
            scope: ElementScope {
                tab_index: 0,
                frame_index: 0,
                is_main_frame: true,
            },
        }
    }

    fn snapshot(epoch: u64, tab_index: usize, elements: Vec<ElementMeta>) -> Snapshot {
        let hash = format!("{epoch:064x}");
        let element_order: Vec<RefId> = elements.iter().map(|m| m.ref_id.clone()).collect();
        let elements_by_ref: HashMap<RefId, ElementMeta> = elements
            .into_iter()
            .map(|m| (m.ref_id.clone(), m))
            .collect();
        Snapshot {
            snapshot_id: SnapshotId::compose("s", epoch, &hash),
            session_id: "s".into(),
            url: "https://a.test".into(),
            tab_index,
            dom_hash: hash,
            epoch,
            captured_at: 0,
            element_order,
            elements_by_ref,
        }
    }

    #[test]
    fn matching_snapshot_is_usable() {
        let snap = snapshot(3, 0, vec![element(0, "gaia-button-a-0", "Go", 50.0)]);
        let state = initial_ref_state(&snap.snapshot_id, Some(&snap), &RefId::compose(0, 0, 0), 0);
        assert_eq!(state, None);
    }

    #[test]
    fn missing_snapshot_and_ref_classify_distinctly() {
        let snap = snapshot(3, 0, vec![element(0, "gaia-button-a-0", "Go", 50.0)]);
        assert_eq!(
            initial_ref_state(&snap.snapshot_id, None, &RefId::compose(0, 0, 0), 0),
            Some(RefState::SnapshotNotFound)
        );
        assert_eq!(
            initial_ref_state(&snap.snapshot_id, Some(&snap), &RefId::compose(0, 0, 9), 0),
            Some(RefState::RefNotFound)
        );
    }

    #[test]
    fn epoch_and_tab_mismatches_are_stale() {
        let snap = snapshot(3, 0, vec![element(0, "gaia-button-a-0", "Go", 50.0)]);
        let wrong_epoch = SnapshotId::compose("s", 2, &snap.dom_hash);
        assert_eq!(
            initial_ref_state(&wrong_epoch, Some(&snap), &RefId::compose(0, 0, 0), 0),
            Some(RefState::Stale)
        );
        assert_eq!(
            initial_ref_state(&snap.snapshot_id, Some(&snap), &RefId::compose(0, 0, 0), 1),
            Some(RefState::Stale)
        );
    }

    #[test]
    fn hash_prefix_mismatch_is_stale() {
        let snap = snapshot(3, 0, vec![element(0, "gaia-button-a-0", "Go", 50.0)]);
        let wrong_hash = SnapshotId::compose("s", 3, &"f".repeat(64));
        assert_eq!(
            initial_ref_state(&wrong_hash, Some(&snap), &RefId::compose(0, 0, 0), 0),
            Some(RefState::Stale)
        );
    }

    #[test]
    fn rescue_prefers_exact_dom_ref_match() {
        let old = element(0, "gaia-button-a-0", "Go", 50.0);
        let fresh = snapshot(
            4,
            0,
            vec![
                element(0, "gaia-button-b-9", "Other", 400.0),
                element(1, "gaia-button-a-0", "Go", 600.0),
            ],
        );
        let hit = rescue_stale_ref(Some(&old), &fresh).unwrap();
        assert_eq!(hit.dom_ref, "gaia-button-a-0");
    }

    #[test]
    fn rescue_falls_back_to_similarity() {
        let mut old = element(0, "gaia-button-gone-0", "Submit order", 50.0);
        old.selector = "#submit".into();
        old.full_selector = "#submit".into();

        let mut near = element(0, "gaia-button-new-0", "Submit order", 52.0);
        near.selector = "#submit".into();
        near.full_selector = "#submit".into();
        let far = element(1, "gaia-button-new-1", "Cancel", 900.0);

        let fresh = snapshot(5, 0, vec![near, far]);
        let hit = rescue_stale_ref(Some(&old), &fresh).unwrap();
        assert_eq!(hit.dom_ref, "gaia-button-new-0");
    }

    #[test]
    fn rescue_rejects_weak_candidates() {
        let old = element(0, "gaia-button-gone-0", "Submit order", 50.0);
        let mut unrelated = element(0, "gaia-div-new-0", "", 5000.0);
        unrelated.tag = "div".into();
        unrelated.selector = ".totally-different".into();
        unrelated.full_selector = "iframe[name=\"x\"] >>> .totally-different".into();
        unrelated.scope.frame_index = 3;
        unrelated.scope.tab_index = 2;
        let fresh = snapshot(5, 0, vec![unrelated]);
        assert!(rescue_stale_ref(Some(&old), &fresh).is_none());
    }

    #[test]
    fn rescue_without_old_meta_is_none() {
        let fresh = snapshot(5, 0, vec![element(0, "gaia-button-a-0", "Go", 50.0)]);
        assert!(rescue_stale_ref(None, &fresh).is_none());
    }
}
