//! Visual capture: screenshots and PDFs.

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, PrintToPdfParams,
};
use serde_json::{json, Value};

use crate::errors::HostError;
use crate::server::actions::{bool_param, session_id, str_param, tab_identifier, u64_param};
use crate::server::state::AppState;

pub async fn screenshot(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    if let Some(url) = str_param(params, "url") {
        browser_session::navigate_if_needed(&page, &url, false).await?;
    }

    let format = match str_param(params, "type").as_deref() {
        Some("jpeg") | Some("jpg") => CaptureScreenshotFormat::Jpeg,
        _ => CaptureScreenshotFormat::Png,
    };
    let mut builder = CaptureScreenshotParams::builder().format(format);
    if let Some(quality) = u64_param(params, "quality") {
        builder = builder.quality(quality.min(100) as i64);
    }
    if bool_param(params, "full_page", false) {
        builder = builder.capture_beyond_viewport(true);
    }
    let bytes = page
        .screenshot(builder.build())
        .await
        .map_err(|err| HostError::internal(err.to_string()))?;

    let url = page
        .url()
        .await
        .map_err(browser_session::SessionError::from)?
        .unwrap_or_default();
    let title = page
        .get_title()
        .await
        .map_err(browser_session::SessionError::from)?
        .unwrap_or_default();

    if let Some(path) = str_param(params, "path") {
        let resolved = session.config.artifact_path(&path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| HostError::internal(err.to_string()))?;
        }
        tokio::fs::write(&resolved, &bytes)
            .await
            .map_err(|err| HostError::internal(err.to_string()))?;
        return Ok(json!({
            "success": true,
            "reason_code": "ok",
            "path": resolved.display().to_string(),
            "url": url,
            "title": title,
        }));
    }

    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "screenshot": base64::engine::general_purpose::STANDARD.encode(&bytes),
        "url": url,
        "title": title,
    }))
}

pub async fn pdf(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    let bytes = page
        .pdf(PrintToPdfParams::default())
        .await
        .map_err(|err| HostError::internal(err.to_string()))?;

    if let Some(path) = str_param(params, "path") {
        let resolved = session.config.artifact_path(&path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| HostError::internal(err.to_string()))?;
        }
        tokio::fs::write(&resolved, &bytes)
            .await
            .map_err(|err| HostError::internal(err.to_string()))?;
        return Ok(json!({
            "success": true,
            "reason_code": "ok",
            "path": resolved.display().to_string(),
        }));
    }

    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "pdf": base64::engine::general_purpose::STANDARD.encode(&bytes),
    }))
}
