//! `/execute` action handlers.

pub mod act;
pub mod capture;
pub mod misc;
pub mod observe;
pub mod session;
pub mod snapshot;
pub mod state_env;
pub mod tabs;
pub mod wait;

use serde_json::Value;

use gaia_core_types::SessionId;

use crate::errors::HostError;

/// Session id from params, defaulting like every other host operation.
pub(crate) fn session_id(params: &Value) -> SessionId {
    params
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::from)
        .unwrap_or_default()
}

pub(crate) fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn require_str(params: &Value, key: &str) -> Result<String, HostError> {
    str_param(params, key)
        .ok_or_else(|| HostError::invalid_input(format!("missing required param: {key}")))
}

pub(crate) fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn u64_param(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

/// Loose tab identifier: `tab_id`, `targetId` or `index`, whichever is set.
pub(crate) fn tab_identifier(params: &Value) -> Option<Value> {
    for key in ["targetId", "target_id", "tab_id", "index"] {
        if let Some(value) = params.get(key) {
            if !value.is_null() {
                return Some(value.clone());
            }
        }
    }
    None
}
