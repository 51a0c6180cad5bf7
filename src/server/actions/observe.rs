//! Observability reads: console, page errors, network, response bodies.

use serde_json::{json, Value};

use crate::errors::HostError;
use crate::server::actions::{require_str, session_id, str_param, tab_identifier, u64_param};
use crate::server::state::AppState;

const DEFAULT_LIMIT: usize = 100;

fn limit(params: &Value) -> usize {
    u64_param(params, "limit").map(|v| v as usize).unwrap_or(DEFAULT_LIMIT)
}

pub async fn console_get(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let session = handle.lock().await;
    let level = str_param(params, "level");
    let entries: Vec<_> = session
        .observability
        .console
        .lock()
        .tail(limit(params))
        .into_iter()
        .filter(|entry| level.as_deref().map(|l| entry.kind == l).unwrap_or(true))
        .collect();
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "entries": entries,
    }))
}

pub async fn errors_get(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let session = handle.lock().await;
    let entries = session.observability.errors.lock().tail(limit(params));
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "entries": entries,
    }))
}

pub async fn requests_get(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let session = handle.lock().await;
    let url_contains = str_param(params, "url_contains");
    let entries: Vec<_> = session
        .observability
        .requests
        .lock()
        .tail(limit(params))
        .into_iter()
        .filter(|entry| {
            url_contains
                .as_deref()
                .map(|needle| entry.url.contains(needle))
                .unwrap_or(true)
        })
        .collect();
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "entries": entries,
    }))
}

pub async fn response_body(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let request_id = require_str(params, "request_id")?;
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;
    let observability = std::sync::Arc::clone(&session.observability);
    let body = observability.response_body(&page, &request_id).await?;
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "body": body,
    }))
}
