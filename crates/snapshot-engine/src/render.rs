//! Text renderings of a snapshot.
//!
//! Rendering filters and truncates the textual view only; the underlying
//! ref map is never altered.

use serde::Serialize;

use gaia_core_types::{ElementMeta, ElementType, Snapshot, SnapshotFormat};

/// Roles that count as interactive for the text filters.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "tab", "menuitem", "checkbox", "radio", "switch", "option", "treeitem",
    "textbox", "combobox", "searchbox",
];

#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    pub format: SnapshotFormat,
    /// Keep only interactive elements in the text view.
    pub interactive_only: bool,
    /// Drop low-signal semantic entries.
    pub compact: bool,
    /// Cap on rendered rows.
    pub limit: Option<usize>,
    /// Character budget for the rendered text.
    pub max_chars: Option<usize>,
    /// Append `[ref=...]` markers to each row.
    pub include_refs: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RenderedSnapshot {
    pub text: String,
    pub truncated: bool,
    pub rendered_elements: usize,
    pub total_elements: usize,
}

fn is_interactive(meta: &ElementMeta) -> bool {
    match meta.element_type {
        ElementType::Input | ElementType::Button | ElementType::Link | ElementType::Clickable => {
            true
        }
        ElementType::Semantic => meta
            .role()
            .map(|role| INTERACTIVE_ROLES.contains(&role))
            .unwrap_or(false),
    }
}

fn display_role(meta: &ElementMeta) -> &str {
    if let Some(role) = meta.role() {
        return role;
    }
    match meta.element_type {
        ElementType::Input => "textbox",
        ElementType::Button => "button",
        ElementType::Link => "link",
        ElementType::Clickable => "button",
        ElementType::Semantic => "generic",
    }
}

fn short_text(meta: &ElementMeta, limit: usize) -> String {
    let collapsed = meta.text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(limit).collect()
}

fn row(meta: &ElementMeta, format: SnapshotFormat, include_refs: bool) -> String {
    let role = display_role(meta);
    let text = short_text(meta, 80);
    let mut line = match format {
        SnapshotFormat::Aria => {
            let indent = if meta.scope.is_main_frame { "" } else { "  " };
            if text.is_empty() {
                format!("{indent}- {role}")
            } else {
                format!("{indent}- {role} \"{text}\"")
            }
        }
        _ => {
            let mut parts = vec![format!("- {role}")];
            if !text.is_empty() {
                parts.push(format!("\"{text}\""));
            }
            if let Some(placeholder) = meta.attribute("placeholder").filter(|v| !v.is_empty()) {
                parts.push(format!("placeholder={placeholder}"));
            }
            if let Some(label) = meta.attribute("aria-label").filter(|v| !v.is_empty()) {
                parts.push(format!("label=\"{label}\""));
            }
            parts.join(" ")
        }
    };
    if include_refs {
        line.push_str(&format!(" [ref={}]", meta.ref_id));
    }
    line
}

/// Render a snapshot to one of the text formats.
pub fn render_snapshot(snapshot: &Snapshot, options: &RenderOptions) -> RenderedSnapshot {
    let total_elements = snapshot.element_count();

    let mut kept: Vec<&ElementMeta> = snapshot
        .elements()
        .filter(|meta| {
            if options.interactive_only && !is_interactive(meta) {
                return false;
            }
            if options.compact
                && meta.element_type == ElementType::Semantic
                && meta.role().is_none()
                && meta.text.trim().is_empty()
            {
                return false;
            }
            true
        })
        .collect();

    if matches!(options.format, SnapshotFormat::Role) {
        kept.retain(|meta| is_interactive(meta) || meta.role().is_some());
    }

    let mut truncated = false;
    if let Some(limit) = options.limit {
        if kept.len() > limit {
            kept.truncate(limit);
            truncated = true;
        }
    }

    let mut lines: Vec<String> = Vec::with_capacity(kept.len() + 1);
    lines.push(format!("# page: {}", snapshot.url));
    for meta in &kept {
        lines.push(row(meta, options.format, options.include_refs));
    }
    let mut text = lines.join("\n");

    if let Some(max_chars) = options.max_chars {
        if text.chars().count() > max_chars {
            text = text.chars().take(max_chars).collect();
            truncated = true;
        }
    }

    RenderedSnapshot {
        text,
        truncated,
        rendered_elements: kept.len(),
        total_elements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_core_types::{
        BoundingBox, ElementScope, RefId, SnapshotId,
    };
    use std::collections::{BTreeMap, HashMap};

    fn meta(idx: usize, element_type: ElementType, text: &str, role: Option<&str>) -> ElementMeta {
        let mut attributes = BTreeMap::new();
        if let Some(role) = role {
            attributes.insert("role".to_string(), role.to_string());
        }
        ElementMeta {
            ref_id: RefId::compose(0, 0, idx),
            dom_ref: format!("gaia-el-x-{idx}"),
            tag: "div".into(),
            text: text.into(),
            selector: String::new(),
            full_selector: String::new(),
            frame_name: String::new(),
            attributes,
            bounding_box: BoundingBox::default(),
            element_type,
            scope: ElementScope {
                tab_index: 0,
                frame_index: 0,
                is_main_frame: true,
            },
        }
    }

    fn snapshot(elements: Vec<ElementMeta>) -> Snapshot {
        let element_order: Vec<RefId> = elements.iter().map(|m| m.ref_id.clone()).collect();
        let elements_by_ref: HashMap<RefId, ElementMeta> = elements
            .into_iter()
            .map(|m| (m.ref_id.clone(), m))
            .collect();
        Snapshot {
            snapshot_id: SnapshotId::compose("s", 1, &"a".repeat(64)),
            session_id: "s".into(),
            url: "https://example.test".into(),
            tab_index: 0,
            dom_hash: "a".repeat(64),
            epoch: 1,
            captured_at: 0,
            element_order,
            elements_by_ref,
        }
    }

    #[test]
    fn interactive_filter_drops_plain_semantics() {
        let snap = snapshot(vec![
            meta(0, ElementType::Button, "Go", None),
            meta(1, ElementType::Semantic, "hint text", None),
            meta(2, ElementType::Semantic, "Open menu", Some("menuitem")),
        ]);
        let rendered = render_snapshot(
            &snap,
            &RenderOptions {
                interactive_only: true,
                include_refs: true,
                ..Default::default()
            },
        );
        assert_eq!(rendered.rendered_elements, 2);
        assert!(rendered.text.contains("[ref=t0-f0-e0]"));
        assert!(!rendered.text.contains("hint text"));
    }

    #[test]
    fn limit_and_char_budget_mark_truncation() {
        let snap = snapshot((0..10).map(|i| meta(i, ElementType::Link, "Link", None)).collect());
        let rendered = render_snapshot(
            &snap,
            &RenderOptions {
                limit: Some(3),
                ..Default::default()
            },
        );
        assert!(rendered.truncated);
        assert_eq!(rendered.rendered_elements, 3);
        assert_eq!(rendered.total_elements, 10);

        let tight = render_snapshot(
            &snap,
            &RenderOptions {
                max_chars: Some(20),
                ..Default::default()
            },
        );
        assert!(tight.truncated);
        assert!(tight.text.chars().count() <= 20);
    }

    #[test]
    fn rendering_does_not_touch_the_ref_map() {
        let snap = snapshot(vec![meta(0, ElementType::Button, "Go", None)]);
        let before = snap.element_count();
        let _ = render_snapshot(
            &snap,
            &RenderOptions {
                interactive_only: true,
                compact: true,
                limit: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(snap.element_count(), before);
    }
}
