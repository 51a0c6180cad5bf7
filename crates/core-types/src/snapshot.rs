//! Snapshot and element descriptors.
//!
//! An `ElementMeta` is a descriptor, never a live handle: all resolution from
//! a ref back to a live element goes through the stamped `data-gaia-dom-ref`
//! attribute.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ids::{RefId, SnapshotId};

/// DOM attribute stamped on every enumerated element.
pub const DOM_REF_ATTRIBUTE: &str = "data-gaia-dom-ref";

/// How many snapshots a session retains before evicting by epoch.
pub const SNAPSHOT_CACHE_CAP: usize = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }

    /// Squared distance between the centers of two boxes.
    pub fn center_distance_sq(&self, other: &BoundingBox) -> f64 {
        let dx = self.center_x - other.center_x;
        let dy = self.center_y - other.center_y;
        dx * dx + dy * dy
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Input,
    Button,
    Link,
    Clickable,
    Semantic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementScope {
    pub tab_index: usize,
    pub frame_index: usize,
    pub is_main_frame: bool,
}

/// Per-element snapshot entry. Owned by exactly one snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementMeta {
    pub ref_id: RefId,
    pub dom_ref: String,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    /// Human-oriented CSS selector. Informational only; never accepted back
    /// from callers.
    #[serde(default)]
    pub selector: String,
    /// Frame-qualified selector (`iframe-sel >>> inner`) for display.
    #[serde(default)]
    pub full_selector: String,
    #[serde(default)]
    pub frame_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    pub element_type: ElementType,
    pub scope: ElementScope,
}

impl ElementMeta {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn role(&self) -> Option<&str> {
        self.attribute("role").filter(|v| !v.is_empty())
    }
}

/// Immutable capture of the DOM at one moment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: SnapshotId,
    pub session_id: String,
    pub url: String,
    pub tab_index: usize,
    pub dom_hash: String,
    pub epoch: u64,
    /// Capture timestamp, milliseconds since the unix epoch.
    pub captured_at: i64,
    /// Ref ids in enumeration order.
    pub element_order: Vec<RefId>,
    pub elements_by_ref: HashMap<RefId, ElementMeta>,
}

impl Snapshot {
    pub fn element(&self, ref_id: &RefId) -> Option<&ElementMeta> {
        self.elements_by_ref.get(ref_id)
    }

    /// Elements in enumeration order.
    pub fn elements(&self) -> impl Iterator<Item = &ElementMeta> {
        self.element_order
            .iter()
            .filter_map(|id| self.elements_by_ref.get(id))
    }

    pub fn element_count(&self) -> usize {
        self.elements_by_ref.len()
    }

    /// Find an element by its stamped dom-ref, case-insensitively.
    pub fn element_by_dom_ref(&self, dom_ref: &str) -> Option<&ElementMeta> {
        let needle = dom_ref.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.elements()
            .find(|meta| meta.dom_ref.trim().to_ascii_lowercase() == needle)
    }
}

/// Bounded per-session snapshot cache. Overflow evicts the oldest epoch and
/// is never an error.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<SnapshotId, Snapshot>,
    cap: usize,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::with_cap(SNAPSHOT_CACHE_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            snapshots: HashMap::new(),
            cap: cap.max(1),
        }
    }

    pub fn insert(&mut self, snapshot: Snapshot) {
        self.snapshots
            .insert(snapshot.snapshot_id.clone(), snapshot);
        while self.snapshots.len() > self.cap {
            let oldest = self
                .snapshots
                .values()
                .min_by_key(|s| s.epoch)
                .map(|s| s.snapshot_id.clone());
            match oldest {
                Some(id) => {
                    self.snapshots.remove(&id);
                }
                None => break,
            }
        }
    }

    pub fn get(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn contains(&self, id: &SnapshotId) -> bool {
        self.snapshots.contains_key(id)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.values().max_by_key(|s| s.epoch)
    }
}

/// Rendered snapshot formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Default structured JSON with the ref map.
    #[default]
    Ref,
    /// Role-tree text for VLM consumption.
    Ai,
    /// Aria-style indented tree.
    Aria,
    /// Filtered role tree.
    Role,
}

impl SnapshotFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ref" => Some(SnapshotFormat::Ref),
            "ai" => Some(SnapshotFormat::Ai),
            "aria" => Some(SnapshotFormat::Aria),
            "role" => Some(SnapshotFormat::Role),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    #[default]
    Full,
    Efficient,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(session: &str, epoch: u64) -> Snapshot {
        let hash = format!("{epoch:064x}");
        Snapshot {
            snapshot_id: SnapshotId::compose(session, epoch, &hash),
            session_id: session.to_string(),
            url: "https://example.test".to_string(),
            tab_index: 0,
            dom_hash: hash,
            epoch,
            captured_at: 0,
            element_order: Vec::new(),
            elements_by_ref: HashMap::new(),
        }
    }

    #[test]
    fn store_evicts_oldest_epoch_beyond_cap() {
        let mut store = SnapshotStore::with_cap(20);
        for epoch in 1..=21 {
            store.insert(snapshot("s", epoch));
        }
        assert_eq!(store.len(), 20);
        let first = SnapshotId::compose("s", 1, &format!("{:064x}", 1u64));
        assert!(!store.contains(&first));
        let newest = SnapshotId::compose("s", 21, &format!("{:064x}", 21u64));
        assert!(store.contains(&newest));
    }

    #[test]
    fn latest_tracks_highest_epoch() {
        let mut store = SnapshotStore::new();
        store.insert(snapshot("s", 2));
        store.insert(snapshot("s", 9));
        store.insert(snapshot("s", 5));
        assert_eq!(store.latest().unwrap().epoch, 9);
    }

    #[test]
    fn dom_ref_lookup_is_case_insensitive() {
        let mut snap = snapshot("s", 1);
        let ref_id = RefId::compose(0, 0, 0);
        snap.element_order.push(ref_id.clone());
        snap.elements_by_ref.insert(
            ref_id.clone(),
            ElementMeta {
                ref_id,
                dom_ref: "gaia-button-xyz-0".to_string(),
                tag: "button".to_string(),
                text: String::new(),
                selector: String::new(),
                full_selector: String::new(),
                frame_name: String::new(),
                attributes: BTreeMap::new(),
                bounding_box: BoundingBox::default(),
                element_type: ElementType::Button,
                scope: ElementScope::default(),
            },
        );
        assert!(snap.element_by_dom_ref("GAIA-Button-XYZ-0").is_some());
        assert!(snap.element_by_dom_ref("missing").is_none());
    }
}
