//! Snapshot operation.

use serde_json::{json, Value};

use gaia_core_types::{SnapshotFormat, SnapshotMode};
use snapshot_engine::{capture_snapshot, render_snapshot, RenderOptions};

use crate::errors::HostError;
use crate::metrics;
use crate::server::actions::{bool_param, session_id, str_param, tab_identifier, u64_param};
use crate::server::state::AppState;

pub async fn snapshot(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    let url = str_param(params, "url");
    let format = str_param(params, "format")
        .map(|f| {
            SnapshotFormat::parse(&f)
                .ok_or_else(|| HostError::invalid_input(format!("unknown snapshot format: {f}")))
        })
        .transpose()?
        .unwrap_or_default();
    let mode = match str_param(params, "mode").as_deref() {
        Some("efficient") => SnapshotMode::Efficient,
        Some("full") | None => SnapshotMode::Full,
        Some(other) => {
            return Err(HostError::invalid_input(format!(
                "unknown snapshot mode: {other}"
            )))
        }
    };

    let captured = capture_snapshot(
        &mut session,
        &page,
        url.as_deref(),
        &state.capture_options(),
    )
    .await;
    let snapshot = match captured {
        Ok(snapshot) => {
            metrics::record_snapshot("ok");
            snapshot
        }
        Err(err) => {
            metrics::record_snapshot("error");
            return Err(err.into());
        }
    };

    let elements: Vec<&gaia_core_types::ElementMeta> = snapshot.elements().collect();
    let mut response = json!({
        "success": true,
        "reason_code": "ok",
        "snapshot_id": snapshot.snapshot_id.as_str(),
        "epoch": snapshot.epoch,
        "dom_hash": snapshot.dom_hash,
        "tab_index": snapshot.tab_index,
        "captured_at": snapshot.captured_at,
        "url": snapshot.url,
        "elements": elements,
        "elements_by_ref": snapshot.elements_by_ref,
    });

    if format != SnapshotFormat::Ref {
        let efficient = mode == SnapshotMode::Efficient;
        let options = RenderOptions {
            format,
            interactive_only: bool_param(params, "interactive", efficient),
            compact: bool_param(params, "compact", efficient),
            limit: u64_param(params, "limit").map(|v| v as usize),
            max_chars: u64_param(params, "max_chars").map(|v| v as usize),
            include_refs: bool_param(params, "refs", true),
        };
        let rendered = render_snapshot(&snapshot, &options);
        response["snapshot"] = json!(rendered.text);
        response["snapshot_truncated"] = json!(rendered.truncated);
        response["rendered_elements"] = json!(rendered.rendered_elements);
    }

    Ok(response)
}
