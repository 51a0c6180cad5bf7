//! Highlight, dialog/file-chooser arming, download wait and assertions.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::browser::{
    EventDownloadProgress, EventDownloadWillBegin, DownloadProgressState,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use futures::StreamExt;
use serde_json::{json, Value};

use browser_session::DialogMode;
use gaia_core_types::{ReasonCode, RefId, SnapshotId};

use crate::errors::HostError;
use crate::server::actions::{require_str, session_id, str_param, tab_identifier, u64_param};
use crate::server::state::AppState;

/// Outline a ref'd element for a moment so a human watching the screencast
/// can see what the agent is about to touch.
pub async fn highlight(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let snapshot_id: SnapshotId = require_str(params, "snapshot_id")?.as_str().into();
    let ref_id: RefId = require_str(params, "ref_id")?.as_str().into();

    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    let dom_ref = session
        .snapshots
        .get(&snapshot_id)
        .and_then(|snap| snap.element(&ref_id))
        .map(|meta| meta.dom_ref.clone())
        .ok_or_else(|| HostError::not_found("snapshot or ref not found"))?;

    let script = format!(
        r#"(() => {{
    const el = document.querySelector('[data-gaia-dom-ref="{dom_ref}"]');
    if (!el) return false;
    const previous = el.style.outline;
    el.style.outline = '3px solid #ff5722';
    setTimeout(() => {{ el.style.outline = previous; }}, 1500);
    return true;
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    let found = session
        .evaluate_with_timeout(&page, &script, timeout)
        .await?
        .as_bool()
        .unwrap_or(false);

    Ok(json!({
        "success": found,
        "reason_code": if found { ReasonCode::Ok } else { ReasonCode::NotFound },
    }))
}

/// Arm automatic dialog handling for the session.
pub async fn dialog_arm(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let mode = match str_param(params, "mode").as_deref() {
        Some("accept") => DialogMode::Accept,
        Some("dismiss") | None => DialogMode::Dismiss,
        Some(other) => {
            return Err(HostError::invalid_input(format!(
                "dialog mode must be accept or dismiss, got {other}"
            )))
        }
    };
    let prompt_text = str_param(params, "prompt_text").unwrap_or_default();

    let handle = state.registry.get_or_create(&session_id(params));
    let session = handle.lock().await;
    *session.arming.dialog_mode.lock() = mode;
    *session.arming.dialog_prompt_text.lock() = prompt_text;
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "mode": mode,
    }))
}

/// Arm the file chooser with paths, each validated against the data root.
pub async fn file_chooser_arm(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let files = params
        .get("files")
        .and_then(Value::as_array)
        .ok_or_else(|| HostError::invalid_input("file_chooser_arm requires a files array"))?;

    let handle = state.registry.get_or_create(&session_id(params));
    let session = handle.lock().await;
    let mut resolved = Vec::with_capacity(files.len());
    for file in files {
        let Some(path) = file.as_str() else {
            return Err(HostError::invalid_input("files entries must be strings"));
        };
        resolved.push(session.config.artifact_path(path)?);
    }
    let count = resolved.len();
    *session.arming.file_chooser_files.lock() = resolved;
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "armed_files": count,
    }))
}

/// Wait for a download to complete, reporting the saved artifact.
pub async fn download_wait(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let timeout_ms = u64_param(params, "timeout_ms").unwrap_or(30_000).clamp(1_000, 120_000);

    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    let download_dir = session.config.data_root.join("downloads");
    tokio::fs::create_dir_all(&download_dir)
        .await
        .map_err(|err| HostError::internal(err.to_string()))?;
    page.execute(
        SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(download_dir.display().to_string())
            .events_enabled(true)
            .build()
            .map_err(HostError::internal)?,
    )
    .await
    .map_err(|err| HostError::internal(err.to_string()))?;

    let mut begins = page
        .event_listener::<EventDownloadWillBegin>()
        .await
        .map_err(|err| HostError::internal(err.to_string()))?;
    let mut progress = page
        .event_listener::<EventDownloadProgress>()
        .await
        .map_err(|err| HostError::internal(err.to_string()))?;

    let wait = async {
        let mut guid = String::new();
        let mut suggested = String::new();
        loop {
            tokio::select! {
                begin = begins.next() => {
                    if let Some(begin) = begin {
                        guid = begin.guid.clone();
                        suggested = begin.suggested_filename.clone();
                    }
                }
                update = progress.next() => {
                    match update {
                        Some(update) if update.state == DownloadProgressState::Completed => {
                            return Some((guid.clone(), suggested.clone()));
                        }
                        Some(update) if update.state == DownloadProgressState::Canceled => {
                            return None;
                        }
                        Some(_) => {}
                        None => return None,
                    }
                }
            }
        }
    };

    match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
        Ok(Some((guid, suggested_filename))) => {
            let saved = download_dir.join(&guid);
            session.observability.add_download_event(browser_session::DownloadEntry {
                ts: chrono::Utc::now().timestamp_millis(),
                guid: guid.clone(),
                url: String::new(),
                suggested_filename: suggested_filename.clone(),
                state: "completed".into(),
            });
            Ok(json!({
                "success": true,
                "reason_code": "ok",
                "guid": guid,
                "suggested_filename": suggested_filename,
                "path": saved.display().to_string(),
            }))
        }
        Ok(None) => Ok(json!({
            "success": false,
            "reason_code": ReasonCode::NotFound,
            "reason": "download canceled",
        })),
        Err(_) => Ok(json!({
            "success": false,
            "reason_code": ReasonCode::ActionTimeout,
            "reason": format!("no download completed within {timeout_ms} ms"),
        })),
    }
}

/// Store/compare assertions over page state.
pub async fn assert_op(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let op = require_str(params, "op")?;
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    match op.as_str() {
        // Remember a computed CSS value under a key for later comparison.
        "store_css" => {
            let key = require_str(params, "key")?;
            let selector = require_str(params, "selector")?;
            let property = require_str(params, "property")?;
            let value = read_css(&mut session, &page, &selector, &property).await?;
            session.stored_css_values.insert(key.clone(), value.clone());
            Ok(json!({
                "success": true,
                "reason_code": "ok",
                "key": key,
                "value": value,
            }))
        }
        "css_changed" => {
            let key = require_str(params, "key")?;
            let selector = require_str(params, "selector")?;
            let property = require_str(params, "property")?;
            let stored = session
                .stored_css_values
                .get(&key)
                .cloned()
                .ok_or_else(|| HostError::not_found(format!("no stored css value: {key}")))?;
            let current = read_css(&mut session, &page, &selector, &property).await?;
            let changed = stored != current;
            Ok(json!({
                "success": changed,
                "reason_code": if changed { ReasonCode::Ok } else { ReasonCode::NoStateChange },
                "stored": stored,
                "current": current,
                "changed": changed,
            }))
        }
        "text_visible" => {
            let text = require_str(params, "text")?;
            let text_json = serde_json::to_string(&text)
                .map_err(|err| HostError::internal(err.to_string()))?;
            let script = format!(
                "(((document.body && document.body.innerText) || '').includes({text_json}))"
            );
            let timeout = session.config.evaluate_timeout_ms;
            let visible = session
                .evaluate_with_timeout(&page, &script, timeout)
                .await?
                .as_bool()
                .unwrap_or(false);
            Ok(json!({
                "success": visible,
                "reason_code": if visible { ReasonCode::Ok } else { ReasonCode::NotFound },
                "visible": visible,
            }))
        }
        other => Err(HostError::invalid_input(format!(
            "assert op must be store_css/css_changed/text_visible, got {other}"
        ))),
    }
}

async fn read_css(
    session: &mut browser_session::Session,
    page: &chromiumoxide::page::Page,
    selector: &str,
    property: &str,
) -> Result<String, HostError> {
    let selector_json =
        serde_json::to_string(selector).map_err(|err| HostError::internal(err.to_string()))?;
    let property_json =
        serde_json::to_string(property).map_err(|err| HostError::internal(err.to_string()))?;
    let script = format!(
        r#"(() => {{
    const el = document.querySelector({selector_json});
    if (!el) return null;
    return getComputedStyle(el).getPropertyValue({property_json});
}})()"#
    );
    let timeout = session.config.evaluate_timeout_ms;
    let value = session.evaluate_with_timeout(page, &script, timeout).await?;
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HostError::not_found(format!("selector matched nothing: {selector}")))
}
