//! Live locator resolution from a ref descriptor.
//!
//! The only resolution key is the stamped dom-ref attribute. Multiple
//! matches are disambiguated by bounding-box center distance against the
//! snapshot's recorded center.

use chromiumoxide::page::Page;
use serde::Deserialize;

use browser_session::Session;
use gaia_core_types::ElementMeta;

use crate::errors::ExecError;
use crate::evidence::FIND_BY_DOM_REF_PRELUDE;

/// How many duplicate matches are inspected for disambiguation.
const INSPECT_LIMIT: usize = 25;

#[derive(Debug, Deserialize)]
struct MatchBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// A resolved live element, addressed by dom-ref plus match index.
#[derive(Clone, Debug)]
pub struct ResolvedLocator {
    pub dom_ref: String,
    pub match_index: usize,
    pub selector: String,
    /// Element center in top-frame viewport coordinates.
    pub center_x: f64,
    pub center_y: f64,
}

/// Resolution failure classification, mapped to reason codes by the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum LocateFailure {
    NotFound,
    Ambiguous { matches: usize },
    DomRefMissing,
}

pub async fn resolve_locator(
    session: &mut Session,
    page: &Page,
    meta: &ElementMeta,
) -> Result<Result<ResolvedLocator, LocateFailure>, ExecError> {
    let dom_ref = meta.dom_ref.trim();
    if dom_ref.is_empty() {
        return Ok(Err(LocateFailure::DomRefMissing));
    }
    let selector = format!("[data-gaia-dom-ref=\"{dom_ref}\"]");
    let dom_ref_json = serde_json::to_string(dom_ref)
        .map_err(|err| ExecError::InvalidInput(err.to_string()))?;

    let script = format!(
        r#"(() => {{
{FIND_BY_DOM_REF_PRELUDE}
    const matches = __gaiaFindByDomRef({dom_ref_json});
    return matches.slice(0, {INSPECT_LIMIT}).map((m) => {{
        const rect = m.el.getBoundingClientRect();
        return {{
            x: rect.x + m.offsetX,
            y: rect.y + m.offsetY,
            width: rect.width,
            height: rect.height
        }};
    }});
}})()"#
    );

    let timeout = session.config.evaluate_timeout_ms;
    let raw = session.evaluate_with_timeout(page, &script, timeout).await?;
    let boxes: Vec<MatchBox> = serde_json::from_value(raw).unwrap_or_default();

    if boxes.is_empty() {
        return Ok(Err(LocateFailure::NotFound));
    }

    if boxes.len() == 1 {
        let b = &boxes[0];
        return Ok(Ok(ResolvedLocator {
            dom_ref: dom_ref.to_string(),
            match_index: 0,
            selector,
            center_x: b.x + b.width / 2.0,
            center_y: b.y + b.height / 2.0,
        }));
    }

    // Duplicate stamps: pick the candidate nearest the recorded center.
    let (target_cx, target_cy) = meta.bounding_box.center();
    let mut best: Option<(usize, f64)> = None;
    for (idx, b) in boxes.iter().enumerate() {
        if b.width <= 0.0 && b.height <= 0.0 {
            continue;
        }
        let cx = b.x + b.width / 2.0;
        let cy = b.y + b.height / 2.0;
        let dist = (cx - target_cx).powi(2) + (cy - target_cy).powi(2);
        match best {
            Some((_, best_dist)) if best_dist <= dist => {}
            _ => best = Some((idx, dist)),
        }
    }

    match best {
        Some((idx, _)) => {
            let b = &boxes[idx];
            Ok(Ok(ResolvedLocator {
                dom_ref: dom_ref.to_string(),
                match_index: idx,
                selector: format!("{selector} [nth={idx}]"),
                center_x: b.x + b.width / 2.0,
                center_y: b.y + b.height / 2.0,
            }))
        }
        None => Ok(Err(LocateFailure::Ambiguous {
            matches: boxes.len(),
        })),
    }
}
