//! Compressed page view handed to the decision model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on rows shown to the model.
pub const ELEMENT_LISTING_CAP: usize = 50;

/// One element as the model sees it: a small integer id plus the strong
/// signals. The ref id stays attached for execution but is never shown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomElementView {
    pub id: u32,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    pub ref_id: String,
}

/// Snapshot payload reduced to what the loop needs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageView {
    pub snapshot_id: String,
    pub dom_hash: String,
    pub url: String,
    pub elements: Vec<DomElementView>,
}

impl PageView {
    /// Build from a host snapshot payload (the `elements` array of the
    /// `browser_snapshot` response).
    pub fn from_snapshot_payload(payload: &Value) -> Self {
        let snapshot_id = payload
            .get("snapshot_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let dom_hash = payload
            .get("dom_hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let url = payload
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut elements = Vec::new();
        if let Some(raw_elements) = payload.get("elements").and_then(Value::as_array) {
            for (idx, el) in raw_elements.iter().enumerate() {
                let attrs = el.get("attributes").cloned().unwrap_or(Value::Null);
                let attr = |key: &str| {
                    attrs
                        .get(key)
                        .and_then(Value::as_str)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                };
                elements.push(DomElementView {
                    id: idx as u32,
                    tag: el.get("tag").and_then(Value::as_str).unwrap_or_default().to_string(),
                    text: el
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .chars()
                        .take(100)
                        .collect(),
                    role: attr("role"),
                    input_type: attr("type"),
                    placeholder: attr("placeholder"),
                    aria_label: attr("aria-label"),
                    href: attr("href"),
                    ref_id: el
                        .get("ref_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }

        Self {
            snapshot_id,
            dom_hash,
            url,
            elements,
        }
    }

    pub fn element(&self, id: u32) -> Option<&DomElementView> {
        self.elements.get(id as usize)
    }

    /// One line per element, capped, in the shape the decision prompt uses.
    pub fn listing(&self) -> String {
        let mut lines = Vec::with_capacity(self.elements.len().min(ELEMENT_LISTING_CAP));
        for el in self.elements.iter().take(ELEMENT_LISTING_CAP) {
            let mut parts = vec![format!("[{}] <{}>", el.id, el.tag)];
            if !el.text.is_empty() {
                parts.push(format!("\"{}\"", el.text));
            }
            if let Some(role) = &el.role {
                parts.push(format!("role={role}"));
            }
            if let Some(t) = &el.input_type {
                if t != "button" {
                    parts.push(format!("type={t}"));
                }
            }
            if let Some(placeholder) = &el.placeholder {
                parts.push(format!("placeholder=\"{placeholder}\""));
            }
            if let Some(label) = &el.aria_label {
                parts.push(format!("aria-label=\"{label}\""));
            }
            lines.push(parts.join(" "));
        }
        lines.join("\n")
    }

    /// Signals that the page is an auth gate: a password field or login
    /// wording among the interactive elements.
    pub fn auth_gate_visible(&self) -> bool {
        let url = self.url.to_lowercase();
        if ["login", "signin", "auth", "sso"].iter().any(|kw| url.contains(kw)) {
            return true;
        }
        self.elements.iter().any(|el| {
            el.input_type.as_deref() == Some("password")
                || el.text.to_lowercase().contains("sign in")
                || el.text.to_lowercase().contains("log in")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "snapshot_id": "s:1:abc",
            "dom_hash": "abc123",
            "url": "https://example.test/login",
            "elements": [
                {"tag": "input", "text": "", "ref_id": "t0-f0-e0",
                 "attributes": {"type": "password", "placeholder": "Password"}},
                {"tag": "button", "text": "Sign In", "ref_id": "t0-f0-e1",
                 "attributes": {"type": "submit"}}
            ]
        })
    }

    #[test]
    fn view_assigns_sequential_ids_and_keeps_refs() {
        let view = PageView::from_snapshot_payload(&payload());
        assert_eq!(view.elements.len(), 2);
        assert_eq!(view.element(0).unwrap().ref_id, "t0-f0-e0");
        assert_eq!(view.element(1).unwrap().id, 1);
        assert!(view.element(5).is_none());
    }

    #[test]
    fn listing_renders_one_line_per_element() {
        let view = PageView::from_snapshot_payload(&payload());
        let listing = view.listing();
        assert!(listing.contains("[0] <input>"));
        assert!(listing.contains("placeholder=\"Password\""));
        assert!(listing.contains("[1] <button> \"Sign In\""));
    }

    #[test]
    fn listing_is_capped() {
        let elements: Vec<Value> = (0..80)
            .map(|i| json!({"tag": "a", "text": format!("link {i}"), "ref_id": format!("t0-f0-e{i}")}))
            .collect();
        let view = PageView::from_snapshot_payload(&json!({
            "snapshot_id": "s:1:x", "dom_hash": "h", "url": "u", "elements": elements
        }));
        assert_eq!(view.listing().lines().count(), ELEMENT_LISTING_CAP);
    }

    #[test]
    fn password_field_marks_an_auth_gate() {
        let view = PageView::from_snapshot_payload(&payload());
        assert!(view.auth_gate_visible());
        let plain = PageView::from_snapshot_payload(&json!({
            "snapshot_id": "s:1:x", "dom_hash": "h", "url": "https://example.test/docs",
            "elements": [{"tag": "a", "text": "Docs", "ref_id": "t0-f0-e0"}]
        }));
        assert!(!plain.auth_gate_visible());
    }
}
