//! Element dedupe and signal scoring.
//!
//! The same element can be collected by several enumeration passes; the copy
//! with the strongest signal wins. When the page yields more elements than
//! the cap, the highest-signal ones are kept.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use gaia_core_types::{BoundingBox, ElementType};

pub const DEFAULT_MAX_ELEMENTS: usize = 2200;
pub const MIN_MAX_ELEMENTS: usize = 200;
pub const MAX_MAX_ELEMENTS: usize = 8000;

/// Attribute keys that count as strong identification signals.
const STRONG_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "data-testid",
    "aria-label",
    "href",
    "role",
    "type",
    "placeholder",
    "title",
];

/// Element descriptor as produced by the in-page enumeration script.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawElement {
    pub tag: String,
    pub dom_ref: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    pub element_type: ElementType,
    #[serde(default)]
    pub frame_index: usize,
    #[serde(default)]
    pub frame_name: String,
    #[serde(default = "default_true")]
    pub is_main_frame: bool,
    #[serde(default)]
    pub full_selector: String,
}

fn default_true() -> bool {
    true
}

/// Signal strength: text length plus a bonus per strong attribute present.
pub fn signal_score(element: &RawElement) -> usize {
    let mut score = element.text.trim().chars().count();
    for key in STRONG_ATTRIBUTES {
        if element
            .attributes
            .get(*key)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
        {
            score += 10;
        }
    }
    score
}

/// Collapse duplicate dom-refs, keeping the highest-signal copy and the
/// first-seen position.
pub fn dedupe_by_dom_ref(elements: Vec<RawElement>) -> Vec<RawElement> {
    let mut order: Vec<String> = Vec::with_capacity(elements.len());
    let mut best: HashMap<String, RawElement> = HashMap::with_capacity(elements.len());
    for element in elements {
        let key = element.dom_ref.trim().to_string();
        if key.is_empty() {
            continue;
        }
        match best.get(&key) {
            Some(existing) if signal_score(existing) >= signal_score(&element) => {}
            Some(_) => {
                best.insert(key, element);
            }
            None => {
                order.push(key.clone());
                best.insert(key, element);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect()
}

/// Enforce the element cap: over the limit, keep the top elements by signal
/// score.
pub fn cap_elements(mut elements: Vec<RawElement>, max_elements: usize) -> Vec<RawElement> {
    let cap = max_elements.clamp(MIN_MAX_ELEMENTS, MAX_MAX_ELEMENTS);
    if elements.len() <= cap {
        return elements;
    }
    elements.sort_by_key(|e| std::cmp::Reverse(signal_score(e)));
    elements.truncate(cap);
    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(dom_ref: &str, text: &str) -> RawElement {
        RawElement {
            tag: "button".into(),
            dom_ref: dom_ref.into(),
            selector: String::new(),
            text: text.into(),
            attributes: BTreeMap::new(),
            bounding_box: BoundingBox::default(),
            element_type: ElementType::Button,
            frame_index: 0,
            frame_name: String::new(),
            is_main_frame: true,
            full_selector: String::new(),
        }
    }

    #[test]
    fn strong_attributes_raise_the_score() {
        let mut el = element("r1", "go");
        let base = signal_score(&el);
        el.attributes.insert("data-testid".into(), "submit".into());
        assert_eq!(signal_score(&el), base + 10);
    }

    #[test]
    fn dedupe_keeps_the_strongest_copy() {
        let weak = element("r1", "x");
        let mut strong = element("r1", "stronger text");
        strong.attributes.insert("id".into(), "main".into());
        let out = dedupe_by_dom_ref(vec![weak, strong.clone(), element("r2", "other")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, strong.text);
        assert_eq!(out[1].dom_ref, "r2");
    }

    #[test]
    fn dedupe_drops_empty_dom_refs() {
        let out = dedupe_by_dom_ref(vec![element("", "x"), element("r1", "y")]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn cap_keeps_highest_signal_elements() {
        let mut elements = Vec::new();
        for i in 0..250 {
            elements.push(element(&format!("r{i}"), &"t".repeat(i % 50)));
        }
        let mut keeper = element("keeper", &"z".repeat(100));
        keeper.attributes.insert("id".into(), "k".into());
        elements.push(keeper);
        let out = cap_elements(elements, 100);
        // Clamped up to the minimum cap.
        assert_eq!(out.len(), MIN_MAX_ELEMENTS);
        assert!(out.iter().any(|e| e.dom_ref == "keeper"));
    }
}
