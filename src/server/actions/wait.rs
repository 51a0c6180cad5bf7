//! The wait operation: url / load-state / selector / text / js / time.

use std::time::Duration;

use serde_json::{json, Value};

use browser_session::{navigate_if_needed, normalize_url, wait_for_ready_state};
use gaia_core_types::ReasonCode;

use crate::errors::HostError;
use crate::server::actions::{session_id, str_param, tab_identifier, u64_param};
use crate::server::state::AppState;

const ALLOWED_LOAD_STATES: &[&str] = &["load", "domcontentloaded", "networkidle"];

/// Poll a JS predicate until it returns truthy or the timeout elapses.
async fn poll_js(
    page: &chromiumoxide::page::Page,
    expression: &str,
    timeout_ms: u64,
) -> Result<bool, HostError> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let truthy = page
            .evaluate(expression)
            .await
            .ok()
            .and_then(|res| res.into_value::<Value>().ok())
            .map(|v| match v {
                Value::Bool(b) => b,
                Value::Null => false,
                Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .unwrap_or(false);
        if truthy {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub async fn wait(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let timeout_ms = u64_param(params, "timeout_ms")
        .or_else(|| u64_param(params, "timeoutMs"))
        .unwrap_or(20_000)
        .clamp(500, 120_000);
    let selector = str_param(params, "selector");
    let selector_state = str_param(params, "selector_state").unwrap_or_else(|| "visible".into());
    let js_expr = str_param(params, "js").or_else(|| str_param(params, "fn"));
    let target_url = str_param(params, "url");
    let load_state = str_param(params, "load_state").or_else(|| str_param(params, "loadState"));
    let text_contains = str_param(params, "text");
    let text_gone = str_param(params, "text_gone").or_else(|| str_param(params, "textGone"));
    let time_ms = u64_param(params, "time_ms").or_else(|| u64_param(params, "timeMs"));

    if let Some(load_state) = &load_state {
        if !ALLOWED_LOAD_STATES.contains(&load_state.as_str()) {
            return Err(HostError::invalid_input(
                "load_state must be one of: load, domcontentloaded, networkidle",
            ));
        }
    }

    let has_condition = selector.is_some()
        || js_expr.is_some()
        || target_url.is_some()
        || load_state.is_some()
        || text_contains.is_some()
        || text_gone.is_some();
    if time_ms.is_none() && !has_condition {
        return Err(HostError::invalid_input(
            "wait requires at least one of: time_ms, text, text_gone, selector, url, load_state, fn",
        ));
    }

    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (page, _) = session.resolve_page(tab_identifier(params).as_ref()).await?;

    if let Some(ms) = time_ms {
        if !has_condition {
            tokio::time::sleep(Duration::from_millis(ms.min(120_000))).await;
        }
    }

    let mut reason_code = ReasonCode::Ok;

    if let Some(target) = &target_url {
        let current = page
            .url()
            .await
            .map_err(browser_session::SessionError::from)?
            .unwrap_or_default();
        if normalize_url(&current) != normalize_url(target) {
            navigate_if_needed(&page, target, false).await?;
        }
    }

    if load_state.is_some() {
        // All load states collapse onto readyState polling plus the settle
        // the navigation layer already applies.
        wait_for_ready_state(&page, Duration::from_millis(timeout_ms)).await;
    }

    if let Some(selector) = &selector {
        let visible = selector_state != "hidden";
        let expr = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return {not_found};
    const style = getComputedStyle(el);
    const shown = style.display !== 'none' && style.visibility !== 'hidden';
    return {cmp};
}})()"#,
            sel = js_string(selector),
            not_found = if visible { "false" } else { "true" },
            cmp = if visible { "shown" } else { "!shown" },
        );
        if !poll_js(&page, &expr, timeout_ms).await? {
            reason_code = ReasonCode::ActionTimeout;
        }
    }

    if let Some(text) = &text_contains {
        let expr = format!(
            "((document.body && document.body.innerText) || '').includes({})",
            js_string(text)
        );
        if !poll_js(&page, &expr, timeout_ms).await? {
            reason_code = ReasonCode::ActionTimeout;
        }
    }

    if let Some(text) = &text_gone {
        let expr = format!(
            "!(((document.body && document.body.innerText) || '').includes({}))",
            js_string(text)
        );
        if !poll_js(&page, &expr, timeout_ms).await? {
            reason_code = ReasonCode::ActionTimeout;
        }
    }

    if let Some(js) = &js_expr {
        if !poll_js(&page, js, timeout_ms).await? {
            reason_code = ReasonCode::ActionTimeout;
        }
    }

    let current_url = page
        .url()
        .await
        .map_err(browser_session::SessionError::from)?
        .unwrap_or_default();
    session.current_url = current_url.clone();
    Ok(json!({
        "success": reason_code == ReasonCode::Ok,
        "reason_code": reason_code,
        "current_url": current_url,
    }))
}
