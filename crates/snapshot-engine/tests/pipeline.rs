//! Snapshot pipeline invariants over the pure layers: dedupe, hashing, id
//! composition and the bounded store.

use std::collections::BTreeMap;

use gaia_core_types::{
    BoundingBox, ElementType, RefId, Snapshot, SnapshotId, SnapshotStore,
};
use snapshot_engine::{cap_elements, compute_dom_hash, dedupe_by_dom_ref, RawElement};

fn raw(dom_ref: &str, text: &str, frame_index: usize) -> RawElement {
    RawElement {
        tag: "button".into(),
        dom_ref: dom_ref.into(),
        selector: format!("#{dom_ref}"),
        text: text.into(),
        attributes: BTreeMap::new(),
        bounding_box: BoundingBox::default(),
        element_type: ElementType::Button,
        frame_index,
        frame_name: String::new(),
        is_main_frame: frame_index == 0,
        full_selector: format!("#{dom_ref}"),
    }
}

fn snapshot_for(session: &str, epoch: u64, elements: &[RawElement]) -> Snapshot {
    let dom_hash = compute_dom_hash("https://example.test", elements);
    let snapshot_id = SnapshotId::compose(session, epoch, &dom_hash);
    let mut element_order = Vec::new();
    let mut elements_by_ref = std::collections::HashMap::new();
    for (idx, el) in elements.iter().enumerate() {
        let ref_id = RefId::compose(0, el.frame_index, idx);
        element_order.push(ref_id.clone());
        elements_by_ref.insert(
            ref_id.clone(),
            gaia_core_types::ElementMeta {
                ref_id,
                dom_ref: el.dom_ref.clone(),
                tag: el.tag.clone(),
                text: el.text.clone(),
                selector: el.selector.clone(),
                full_selector: el.full_selector.clone(),
                frame_name: el.frame_name.clone(),
                attributes: el.attributes.clone(),
                bounding_box: el.bounding_box,
                element_type: el.element_type,
                scope: gaia_core_types::ElementScope {
                    tab_index: 0,
                    frame_index: el.frame_index,
                    is_main_frame: el.is_main_frame,
                },
            },
        );
    }
    Snapshot {
        snapshot_id,
        session_id: session.into(),
        url: "https://example.test".into(),
        tab_index: 0,
        dom_hash,
        epoch,
        captured_at: 0,
        element_order,
        elements_by_ref,
    }
}

#[test]
fn ref_ids_are_unique_within_a_snapshot() {
    let elements: Vec<RawElement> = (0..30).map(|i| raw(&format!("r{i}"), "x", i % 3)).collect();
    let snapshot = snapshot_for("s1", 1, &elements);
    let mut seen = std::collections::HashSet::new();
    for ref_id in &snapshot.element_order {
        assert!(seen.insert(ref_id.clone()), "duplicate ref id {ref_id}");
    }
    assert_eq!(snapshot.elements_by_ref.len(), elements.len());
}

#[test]
fn unchanged_captures_share_a_hash_but_never_an_id() {
    let elements = vec![raw("r0", "Submit", 0), raw("r1", "Cancel", 0)];
    let first = snapshot_for("s1", 1, &elements);
    let second = snapshot_for("s1", 2, &elements);
    assert_eq!(first.dom_hash, second.dom_hash);
    assert_ne!(first.snapshot_id, second.snapshot_id);
    assert!(first.epoch < second.epoch);
}

#[test]
fn snapshot_id_encodes_epoch_and_hash_prefix() {
    let elements = vec![raw("r0", "Submit", 0)];
    let snapshot = snapshot_for("s1", 7, &elements);
    let parts = snapshot.snapshot_id.parse().unwrap();
    assert_eq!(parts.epoch, 7);
    assert!(snapshot.dom_hash.starts_with(&parts.hash_prefix));
    assert_eq!(parts.hash_prefix.len(), 12);
}

#[test]
fn store_holds_twenty_and_drops_the_oldest() {
    let mut store = SnapshotStore::new();
    for epoch in 1..=21 {
        let elements = vec![raw("r0", &format!("text {epoch}"), 0)];
        store.insert(snapshot_for("s1", epoch, &elements));
    }
    assert_eq!(store.len(), 20);
    let oldest = snapshot_for("s1", 1, &[raw("r0", "text 1", 0)]);
    assert!(!store.contains(&oldest.snapshot_id));
    assert_eq!(store.latest().unwrap().epoch, 21);
}

#[test]
fn dedupe_then_cap_preserves_strong_elements() {
    let mut elements = Vec::new();
    for i in 0..500 {
        elements.push(raw(&format!("r{}", i % 400), "repeat", 0));
    }
    let mut strong = raw("anchor", "Primary call to action with long text", 0);
    strong.attributes.insert("id".into(), "anchor".into());
    strong.attributes.insert("data-testid".into(), "cta".into());
    elements.push(strong);

    let deduped = dedupe_by_dom_ref(elements);
    assert_eq!(deduped.len(), 401);
    let capped = cap_elements(deduped, 200);
    assert!(capped.iter().any(|e| e.dom_ref == "anchor"));
}
