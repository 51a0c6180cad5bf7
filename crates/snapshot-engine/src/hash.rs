//! Canonical dom hashing.
//!
//! The snapshot hash covers the semantic element signature only, so it is
//! stable under reordering of equivalent captures: keys are sorted, text is
//! whitespace-normalized and truncated per element.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::dedupe::RawElement;

const TEXT_SIGNATURE_LEN: usize = 80;

fn normalized_text(text: &str, limit: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(limit).collect()
}

fn attr<'a>(element: &'a RawElement, key: &str) -> &'a str {
    element.attributes.get(key).map(String::as_str).unwrap_or("")
}

/// SHA-256 over the canonical element signature. `serde_json` object keys
/// serialize in sorted order, which keeps the encoding canonical.
pub fn compute_dom_hash(url: &str, elements: &[RawElement]) -> String {
    let compact: Vec<Value> = elements
        .iter()
        .map(|el| {
            json!({
                "tag": el.tag,
                "text": normalized_text(&el.text, TEXT_SIGNATURE_LEN),
                "selector": el.selector,
                "full_selector": el.full_selector,
                "frame_index": el.frame_index,
                "role": attr(el, "role"),
                "type": attr(el, "type"),
                "aria_label": attr(el, "aria-label"),
            })
        })
        .collect();
    let raw = json!({
        "url": url.trim(),
        "elements": compact,
    });
    let encoded = serde_json::to_vec(&raw).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hex_digest(hasher)
}

/// Hash an arbitrary runtime signature string (the light per-action DOM
/// signature).
pub fn runtime_hash_from_signature(signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    hex_digest(hasher)
}

fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_core_types::{BoundingBox, ElementType};
    use std::collections::BTreeMap;

    fn element(text: &str, selector: &str) -> RawElement {
        RawElement {
            tag: "button".into(),
            dom_ref: "gaia-button-x-0".into(),
            selector: selector.into(),
            text: text.into(),
            attributes: BTreeMap::new(),
            bounding_box: BoundingBox::default(),
            element_type: ElementType::Button,
            frame_index: 0,
            frame_name: String::new(),
            is_main_frame: true,
            full_selector: selector.into(),
        }
    }

    #[test]
    fn identical_captures_hash_identically() {
        let a = vec![element("Submit", "#go")];
        let b = vec![element("Submit", "#go")];
        assert_eq!(
            compute_dom_hash("https://a.test", &a),
            compute_dom_hash("https://a.test", &b)
        );
    }

    #[test]
    fn whitespace_differences_do_not_change_the_hash() {
        let a = vec![element("Submit  now", "#go")];
        let b = vec![element("Submit\n now", "#go")];
        assert_eq!(
            compute_dom_hash("https://a.test", &a),
            compute_dom_hash("https://a.test", &b)
        );
    }

    #[test]
    fn text_beyond_the_signature_window_is_ignored() {
        let long_a = format!("{}{}", "x".repeat(80), "tail-a");
        let long_b = format!("{}{}", "x".repeat(80), "tail-b");
        assert_eq!(
            compute_dom_hash("u", &[element(&long_a, "#s")]),
            compute_dom_hash("u", &[element(&long_b, "#s")])
        );
    }

    #[test]
    fn semantic_changes_change_the_hash() {
        assert_ne!(
            compute_dom_hash("u", &[element("Submit", "#go")]),
            compute_dom_hash("u", &[element("Cancel", "#go")])
        );
        assert_ne!(
            compute_dom_hash("https://a.test", &[]),
            compute_dom_hash("https://b.test", &[])
        );
    }

    #[test]
    fn runtime_signature_hash_is_stable() {
        let a = runtime_hash_from_signature("button|submit||go|Submit");
        let b = runtime_hash_from_signature("button|submit||go|Submit");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
