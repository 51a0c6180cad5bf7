//! Action requests crossing the host boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{RefId, SnapshotId};

/// Element-scoped action kinds. The set is closed and small; page-level
/// operations (goto, wait, screenshot, setViewport, evaluate) bypass the ref
/// discipline entirely and are dispatched at the server layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "click")]
    Click,
    #[serde(rename = "fill")]
    Fill,
    #[serde(rename = "press")]
    Press,
    #[serde(rename = "hover")]
    Hover,
    #[serde(rename = "scroll")]
    Scroll,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "dragAndDrop")]
    DragAndDrop,
    #[serde(rename = "dragSlider")]
    DragSlider,
    #[serde(rename = "scrollIntoView")]
    ScrollIntoView,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::Press => "press",
            ActionKind::Hover => "hover",
            ActionKind::Scroll => "scroll",
            ActionKind::Select => "select",
            ActionKind::DragAndDrop => "dragAndDrop",
            ActionKind::DragSlider => "dragSlider",
            ActionKind::ScrollIntoView => "scrollIntoView",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "click" => ActionKind::Click,
            "fill" | "type" => ActionKind::Fill,
            "press" => ActionKind::Press,
            "hover" => ActionKind::Hover,
            "scroll" => ActionKind::Scroll,
            "select" => ActionKind::Select,
            "dragAndDrop" | "drag_and_drop" => ActionKind::DragAndDrop,
            "dragSlider" | "drag_slider" => ActionKind::DragSlider,
            "scrollIntoView" | "scroll_into_view" => ActionKind::ScrollIntoView,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButtonChoice {
    #[default]
    Left,
    Right,
    Middle,
}

/// Optional per-action tuning, mirroring the conventions of the CDP input
/// domain. Unknown fields are ignored on purpose.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActionOptions {
    #[serde(default, alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub button: Option<MouseButtonChoice>,
    #[serde(default)]
    pub modifiers: Option<Vec<String>>,
    #[serde(default, alias = "doubleClick")]
    pub double_click: bool,
}

impl ActionOptions {
    /// Clamp a caller-provided timeout into the accepted window.
    pub fn timeout_or(&self, default_ms: u64) -> u64 {
        self.timeout_ms.unwrap_or(default_ms).clamp(500, 60_000)
    }

    /// Modifier bitmask for CDP input events (Alt=1, Ctrl=2, Meta=4, Shift=8).
    pub fn modifier_bits(&self) -> i64 {
        let Some(mods) = &self.modifiers else {
            return 0;
        };
        let mut bits = 0;
        for m in mods {
            bits |= match m.trim() {
                "Alt" => 1,
                "Control" => 2,
                "Meta" => 4,
                "Shift" => 8,
                _ => 0,
            };
        }
        bits
    }
}

/// One element action, addressed strictly by `(snapshot_id, ref_id)`.
///
/// `selector` is carried only so the host can reject callers that still try
/// to address elements by CSS; `selector_hint` is accepted and ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionRequest {
    pub snapshot_id: SnapshotId,
    pub ref_id: RefId,
    pub kind: ActionKind,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub options: ActionOptions,
    #[serde(default = "default_verify")]
    pub verify: bool,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub selector_hint: Option<String>,
}

fn default_verify() -> bool {
    true
}

impl ActionRequest {
    pub fn new(snapshot_id: SnapshotId, ref_id: RefId, kind: ActionKind) -> Self {
        Self {
            snapshot_id,
            ref_id,
            kind,
            value: None,
            options: ActionOptions::default(),
            verify: true,
            selector: None,
            selector_hint: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// True when the caller smuggled a raw selector alongside the ref.
    pub fn carries_legacy_selector(&self) -> bool {
        self.selector
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn value_as_string(&self) -> Option<String> {
        match &self.value {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serde_uses_camel_case_for_compound_kinds() {
        assert_eq!(
            serde_json::to_string(&ActionKind::DragAndDrop).unwrap(),
            "\"dragAndDrop\""
        );
        assert_eq!(
            serde_json::from_str::<ActionKind>("\"scrollIntoView\"").unwrap(),
            ActionKind::ScrollIntoView
        );
    }

    #[test]
    fn legacy_selector_detection_ignores_whitespace() {
        let mut req = ActionRequest::new(
            SnapshotId::from("s:1:abc"),
            RefId::from("t0-f0-e0"),
            ActionKind::Click,
        );
        assert!(!req.carries_legacy_selector());
        req.selector = Some("   ".to_string());
        assert!(!req.carries_legacy_selector());
        req.selector = Some(".btn".to_string());
        assert!(req.carries_legacy_selector());
    }

    #[test]
    fn modifier_bits_follow_cdp_convention() {
        let opts = ActionOptions {
            modifiers: Some(vec!["Control".into(), "Shift".into(), "bogus".into()]),
            ..Default::default()
        };
        assert_eq!(opts.modifier_bits(), 10);
    }

    #[test]
    fn verify_defaults_to_true() {
        let req: ActionRequest = serde_json::from_str(
            r#"{"snapshot_id":"s:1:abc","ref_id":"t0-f0-e1","kind":"click"}"#,
        )
        .unwrap();
        assert!(req.verify);
        assert!(req.selector_hint.is_none());
    }
}
