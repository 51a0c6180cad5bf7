//! State, environment and trace operations.

use serde_json::{json, Value};

use browser_session::state_ops;
use browser_session::trace::TraceRecorder;

use crate::errors::HostError;
use crate::server::actions::{session_id, str_param, tab_identifier};
use crate::server::state::AppState;

pub async fn state_op(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let op = str_param(params, "op").unwrap_or_else(|| "get".into());
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    let result = match op.as_str() {
        "get" => state_ops::state_get(&page).await?,
        "set" => {
            let payload = params
                .get("state")
                .or_else(|| params.get("payload"))
                .cloned()
                .ok_or_else(|| HostError::invalid_input("state.set requires a state payload"))?;
            state_ops::state_set(&page, &payload).await?
        }
        "clear" => state_ops::state_clear(&page).await?,
        other => {
            return Err(HostError::invalid_input(format!(
                "state op must be get/set/clear, got {other}"
            )))
        }
    };
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "op": op,
        "state": result,
    }))
}

pub async fn env_op(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;
    let overrides = params
        .get("env")
        .or_else(|| params.get("overrides"))
        .cloned()
        .unwrap_or_else(|| params.clone());
    let applied = state_ops::env_set(&page, &overrides).await?;
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "applied": applied,
    }))
}

pub async fn trace_start(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let id = session_id(params);
    let handle = state.registry.get_or_create(&id);
    let mut session = handle.lock().await;
    if session.trace.is_some() {
        return Err(HostError::invalid_input("trace already active"));
    }
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    let requested = str_param(params, "path").unwrap_or_else(|| {
        format!(
            "traces/{}-{}.json",
            id.as_str(),
            chrono::Utc::now().timestamp_millis()
        )
    });
    let path = session.config.artifact_path(&requested)?;
    let recorder = TraceRecorder::start(page, path.clone()).await?;
    session.trace = Some(recorder);
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "active": true,
        "path": path.display().to_string(),
    }))
}

pub async fn trace_stop(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let Some(recorder) = session.trace.take() else {
        return Ok(json!({
            "success": true,
            "reason_code": "ok",
            "active": false,
        }));
    };
    let path = recorder.stop().await?;
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "active": false,
        "path": path.display().to_string(),
    }))
}
