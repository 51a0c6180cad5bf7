//! Cookie/storage state operations and environment emulation.
//!
//! These mutate the live page context directly and are not isolated from
//! concurrent reads of the same session.

use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetGeolocationOverrideParams, SetLocaleOverrideParams,
    SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, CookieParam, GetCookiesParams, SetCookiesParams,
};
use chromiumoxide::page::Page;
use serde_json::{json, Value};

use crate::errors::SessionError;

const READ_STORAGE_JS: &str = r#"
(() => {
    const dump = (storage) => {
        const out = {};
        try {
            for (let i = 0; i < storage.length; i++) {
                const key = storage.key(i);
                out[key] = storage.getItem(key);
            }
        } catch (_) {}
        return out;
    };
    return {
        local_storage: dump(window.localStorage),
        session_storage: dump(window.sessionStorage)
    };
})()
"#;

/// Read cookies plus local/session storage.
pub async fn state_get(page: &Page) -> Result<Value, SessionError> {
    let cookies = page
        .execute(GetCookiesParams::default())
        .await?
        .result
        .cookies;
    let storage: Value = page
        .evaluate(READ_STORAGE_JS)
        .await?
        .into_value()
        .unwrap_or_else(|_| json!({}));
    Ok(json!({
        "cookies": cookies,
        "local_storage": storage.get("local_storage").cloned().unwrap_or(json!({})),
        "session_storage": storage.get("session_storage").cloned().unwrap_or(json!({})),
    }))
}

/// Apply a state payload: cookies and storage entries. Returns the applied
/// diff so callers never have to recompute it.
pub async fn state_set(page: &Page, payload: &Value) -> Result<Value, SessionError> {
    let mut applied = json!({});

    if let Some(cookies) = payload.get("cookies").and_then(Value::as_array) {
        let mut params: Vec<CookieParam> = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let param: CookieParam = serde_json::from_value(cookie.clone())
                .map_err(|err| SessionError::InvalidInput(format!("cookie: {err}")))?;
            params.push(param);
        }
        let count = params.len();
        page.execute(SetCookiesParams::new(params)).await?;
        applied["cookies"] = json!(count);
    }

    for (key, storage_name) in [("local_storage", "localStorage"), ("session_storage", "sessionStorage")] {
        if let Some(entries) = payload.get(key).and_then(Value::as_object) {
            let serialized = serde_json::to_string(entries)
                .map_err(|err| SessionError::InvalidInput(err.to_string()))?;
            let script = format!(
                "(() => {{ const entries = {serialized}; for (const [k, v] of Object.entries(entries)) {{ window.{storage_name}.setItem(k, String(v)); }} return Object.keys(entries).length; }})()"
            );
            let count: Value = page.evaluate(script.as_str()).await?.into_value().unwrap_or(json!(0));
            applied[key] = count;
        }
    }

    Ok(applied)
}

/// Clear cookies and both storages.
pub async fn state_clear(page: &Page) -> Result<Value, SessionError> {
    page.execute(ClearBrowserCookiesParams::default()).await?;
    page.evaluate("(() => { window.localStorage.clear(); window.sessionStorage.clear(); return true; })()")
        .await?;
    Ok(json!({"cleared": true}))
}

/// Apply environment emulation overrides. Unknown keys are ignored; the
/// returned value lists what was applied.
pub async fn env_set(page: &Page, overrides: &Value) -> Result<Value, SessionError> {
    let mut applied: Vec<&str> = Vec::new();

    if let Some(tz) = overrides.get("timezone").and_then(Value::as_str) {
        page.execute(SetTimezoneOverrideParams::new(tz)).await?;
        applied.push("timezone");
    }
    if let Some(locale) = overrides.get("locale").and_then(Value::as_str) {
        let mut params = SetLocaleOverrideParams::default();
        params.locale = Some(locale.to_string());
        page.execute(params).await?;
        applied.push("locale");
    }
    if let Some(ua) = overrides.get("user_agent").and_then(Value::as_str) {
        page.execute(SetUserAgentOverrideParams::new(ua)).await?;
        applied.push("user_agent");
    }
    if let Some(geo) = overrides.get("geolocation").and_then(Value::as_object) {
        let mut params = SetGeolocationOverrideParams::default();
        params.latitude = geo.get("latitude").and_then(Value::as_f64);
        params.longitude = geo.get("longitude").and_then(Value::as_f64);
        params.accuracy = geo.get("accuracy").and_then(Value::as_f64).or(Some(1.0));
        page.execute(params).await?;
        applied.push("geolocation");
    }
    if let Some(viewport) = overrides.get("viewport").and_then(Value::as_object) {
        let width = viewport.get("width").and_then(Value::as_i64).unwrap_or(1280);
        let height = viewport.get("height").and_then(Value::as_i64).unwrap_or(720);
        let params = SetDeviceMetricsOverrideParams::new(width, height, 1.0, false);
        page.execute(params).await?;
        applied.push("viewport");
    }

    Ok(json!({"applied": applied}))
}
