//! The act operation: one element action or one page-level action.

use serde_json::{json, Value};

use action_executor::execute_ref_action;
use browser_session::navigate_if_needed;
use gaia_core_types::{ActionKind, ActionOptions, ActionRequest, ReasonCode};

use crate::errors::HostError;
use crate::metrics;
use crate::server::actions::{session_id, str_param, tab_identifier, u64_param};
use crate::server::state::AppState;

/// Page-level kinds that bypass the ref discipline.
const PAGE_LEVEL_KINDS: &[&str] = &["goto", "wait", "screenshot", "setViewport", "evaluate"];

pub async fn act(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let kind_name = str_param(params, "kind")
        .or_else(|| str_param(params, "action"))
        .ok_or_else(|| HostError::invalid_input("act requires a kind"))?;

    if PAGE_LEVEL_KINDS.contains(&kind_name.as_str()) {
        return page_level_act(state, params, &kind_name).await;
    }

    let Some(kind) = ActionKind::parse(&kind_name) else {
        return Err(HostError::invalid_input(format!(
            "unsupported action kind: {kind_name}"
        )));
    };

    // Reference contract: element actions carry refs or nothing.
    let selector = str_param(params, "selector");
    if selector.is_some() {
        metrics::record_action(kind.as_str(), ReasonCode::LegacySelectorForbidden.as_str());
        return Ok(json!({
            "success": false,
            "effective": false,
            "reason_code": ReasonCode::LegacySelectorForbidden,
            "reason": "element actions must address elements by (snapshot_id, ref_id); raw selectors are forbidden",
        }));
    }
    let (Some(snapshot_id), Some(ref_id)) =
        (str_param(params, "snapshot_id"), str_param(params, "ref_id"))
    else {
        metrics::record_action(kind.as_str(), ReasonCode::RefRequired.as_str());
        return Ok(json!({
            "success": false,
            "effective": false,
            "reason_code": ReasonCode::RefRequired,
            "reason": "element actions require snapshot_id and ref_id",
        }));
    };

    let options: ActionOptions = params
        .get("options")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|err| HostError::invalid_input(format!("bad options: {err}")))?
        .unwrap_or_default();

    let request = ActionRequest {
        snapshot_id: snapshot_id.as_str().into(),
        ref_id: ref_id.as_str().into(),
        kind,
        value: params.get("value").cloned().filter(|v| !v.is_null()),
        options,
        verify: params.get("verify").and_then(Value::as_bool).unwrap_or(true),
        selector: None,
        selector_hint: str_param(params, "selector_hint"),
    };

    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    if let Some(identifier) = tab_identifier(params) {
        session.resolve_page(Some(&identifier)).await?;
    }

    let url = str_param(params, "url");
    let result = execute_ref_action(
        &mut session,
        &state.executor_config(),
        &request,
        url.as_deref(),
    )
    .await;

    metrics::record_action(kind.as_str(), result.reason_code.as_str());
    serde_json::to_value(&result).map_err(|err| HostError::internal(err.to_string()))
}

async fn page_level_act(
    state: &AppState,
    params: &Value,
    kind: &str,
) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, tab_id) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    match kind {
        "goto" => {
            let url = str_param(params, "url")
                .or_else(|| str_param(params, "value"))
                .ok_or_else(|| HostError::invalid_input("goto requires a url"))?;
            navigate_if_needed(&page, &url, true).await?;
        }
        "wait" => {
            let ms = u64_param(params, "time_ms")
                .or_else(|| u64_param(params, "timeMs"))
                .unwrap_or(1000)
                .min(120_000);
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
        "screenshot" => {
            drop(session);
            return crate::server::actions::capture::screenshot(state, params).await;
        }
        "setViewport" => {
            let width = u64_param(params, "width").unwrap_or(1280) as i64;
            let height = u64_param(params, "height").unwrap_or(720) as i64;
            let metrics_params =
                chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams::new(
                    width, height, 1.0, false,
                );
            page.execute(metrics_params)
                .await
                .map_err(|err| HostError::internal(err.to_string()))?;
        }
        "evaluate" => {
            let expression = str_param(params, "js")
                .or_else(|| str_param(params, "value"))
                .ok_or_else(|| HostError::invalid_input("evaluate requires a js expression"))?;
            let timeout = session.config.evaluate_timeout_ms;
            let value = session
                .evaluate_with_timeout(&page, &expression, timeout)
                .await?;
            let current_url = page
                .url()
                .await
                .map_err(browser_session::SessionError::from)?
                .unwrap_or_default();
            return Ok(json!({
                "success": true,
                "effective": true,
                "reason_code": "ok",
                "result": value,
                "current_url": current_url,
                "tab_id": tab_id,
            }));
        }
        _ => return Err(HostError::invalid_input(format!("unsupported kind: {kind}"))),
    }

    let current_url = page
        .url()
        .await
        .map_err(browser_session::SessionError::from)?
        .unwrap_or_default();
    session.current_url = current_url.clone();
    Ok(json!({
        "success": true,
        "effective": true,
        "reason_code": "ok",
        "current_url": current_url,
        "tab_id": tab_id,
    }))
}
