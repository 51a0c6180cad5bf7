//! Session lifecycle operations.

use serde_json::{json, Value};

use browser_session::navigate_if_needed;

use crate::errors::HostError;
use crate::metrics;
use crate::server::actions::{session_id, str_param, tab_identifier};
use crate::server::state::AppState;

/// Open or reuse a session, optionally navigating.
pub async fn start(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let id = session_id(params);
    let handle = state.registry.get_or_create(&id);
    let mut session = handle.lock().await;

    let (page, tab_index) = session.resolve_page(tab_identifier(params).as_ref()).await?;
    if let Some(url) = str_param(params, "url") {
        navigate_if_needed(&page, &url, true).await?;
    }
    session.current_url = page
        .url()
        .await
        .map_err(browser_session::SessionError::from)?
        .unwrap_or_default();
    metrics::set_sessions_active(state.registry.len() as i64);

    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "session_id": id.as_str(),
        "tab_id": tab_index,
        "targetId": page.target_id().as_ref().to_string(),
        "current_url": session.current_url,
    }))
}

/// Report whether a usable browser executable exists.
pub async fn install(_state: &AppState, _params: &Value) -> Result<Value, HostError> {
    let found = browser_session::launch::find_chrome();
    Ok(json!({
        "success": found.is_some(),
        "reason_code": if found.is_some() { "ok" } else { "not_found" },
        "executable": found.map(|p| p.display().to_string()),
    }))
}

/// List profile directories under the data root.
pub async fn profiles(state: &AppState, _params: &Value) -> Result<Value, HostError> {
    let profile_root = state.config.data_root.join("profiles");
    let mut profiles = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&profile_root).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                profiles.push(entry.file_name().to_string_lossy().to_string());
            }
        }
    }
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "profiles": profiles,
    }))
}

/// Close and remove a session.
pub async fn close(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let id = session_id(params);
    let existed = state.registry.close(&id).await;
    metrics::set_sessions_active(state.registry.len() as i64);
    Ok(json!({
        "success": true,
        "reason_code": if existed { "ok" } else { "not_found" },
        "session_id": id.as_str(),
    }))
}
