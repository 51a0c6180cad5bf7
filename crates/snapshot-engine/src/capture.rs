//! Snapshot capture against a live page.

use chromiumoxide::page::Page;
use tracing::{debug, info};

use browser_session::{navigate_if_needed, wait_for_ready_state, Session};
use gaia_core_types::{
    ElementMeta, ElementScope, RefId, Snapshot, SnapshotId,
};

use crate::dedupe::{cap_elements, dedupe_by_dom_ref, RawElement, DEFAULT_MAX_ELEMENTS};
use crate::errors::SnapshotError;
use crate::hash::compute_dom_hash;
use crate::script::ENUMERATE_ELEMENTS_JS;

#[derive(Clone, Debug)]
pub struct CaptureOptions {
    pub max_elements: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

/// Capture a snapshot of the page, navigating first when `url` names a
/// different location. The snapshot is stored in the session cache and
/// becomes the session's current snapshot.
pub async fn capture_snapshot(
    session: &mut Session,
    page: &Page,
    url: Option<&str>,
    options: &CaptureOptions,
) -> Result<Snapshot, SnapshotError> {
    if let Some(url) = url {
        navigate_if_needed(page, url, true).await?;
    } else {
        wait_for_ready_state(page, std::time::Duration::from_secs(2)).await;
    }

    let evaluate_timeout = session.config.evaluate_timeout_ms;
    let raw = session
        .evaluate_with_timeout(page, ENUMERATE_ELEMENTS_JS, evaluate_timeout)
        .await?;
    let elements: Vec<RawElement> = serde_json::from_value(raw)
        .map_err(|err| SnapshotError::Evaluate(format!("bad element payload: {err}")))?;

    let elements = dedupe_by_dom_ref(elements);
    let elements = cap_elements(elements, options.max_elements);
    debug!(count = elements.len(), "elements enumerated");

    let current_url = page.url().await.map_err(browser_session::SessionError::from)?
        .unwrap_or_default();

    let pages = session.pages().await?;
    let tab_index = pages
        .iter()
        .position(|p| p.target_id() == page.target_id())
        .unwrap_or(0);

    let epoch = session.next_epoch();
    let dom_hash = compute_dom_hash(&current_url, &elements);
    let snapshot_id = SnapshotId::compose(session.id.as_str(), epoch, &dom_hash);
    let captured_at = chrono::Utc::now().timestamp_millis();

    let mut element_order = Vec::with_capacity(elements.len());
    let mut elements_by_ref = std::collections::HashMap::with_capacity(elements.len());
    for (idx, raw) in elements.into_iter().enumerate() {
        let ref_id = RefId::compose(tab_index, raw.frame_index, idx);
        let meta = ElementMeta {
            ref_id: ref_id.clone(),
            dom_ref: raw.dom_ref,
            tag: raw.tag,
            text: raw.text,
            selector: raw.selector,
            full_selector: raw.full_selector,
            frame_name: raw.frame_name,
            attributes: raw.attributes,
            bounding_box: raw.bounding_box,
            element_type: raw.element_type,
            scope: ElementScope {
                tab_index,
                frame_index: raw.frame_index,
                is_main_frame: raw.is_main_frame,
            },
        };
        element_order.push(ref_id.clone());
        elements_by_ref.insert(ref_id, meta);
    }

    let snapshot = Snapshot {
        snapshot_id: snapshot_id.clone(),
        session_id: session.id.as_str().to_string(),
        url: current_url.clone(),
        tab_index,
        dom_hash: dom_hash.clone(),
        epoch,
        captured_at,
        element_order,
        elements_by_ref,
    };

    session.snapshots.insert(snapshot.clone());
    session.current_snapshot_id = Some(snapshot_id.clone());
    session.current_dom_hash = dom_hash;
    session.current_url = current_url;

    info!(
        session = %session.id,
        snapshot = %snapshot_id,
        elements = snapshot.element_count(),
        "snapshot captured"
    );
    Ok(snapshot)
}
