//! The `/execute` envelope and action dispatch.
//!
//! One endpoint, one envelope: `{action, params}`. Action names are
//! canonicalized so `act`, `browser_act` and `browser.act` all land on the
//! same handler.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::HostError;
use crate::server::actions;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteEnvelope {
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// Canonical action set of the host protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostAction {
    Start,
    Install,
    Profiles,
    Tabs,
    TabsOpen,
    TabsFocus,
    TabsClose,
    Snapshot,
    Act,
    Wait,
    Screenshot,
    Pdf,
    ConsoleGet,
    ErrorsGet,
    RequestsGet,
    ResponseBody,
    TraceStart,
    TraceStop,
    Highlight,
    DialogArm,
    FileChooserArm,
    DownloadWait,
    StateOp,
    Env,
    Assert,
    Close,
}

/// Map an action name (with or without a `browser_`/`browser.` prefix, dots
/// or underscores) to its canonical handler.
pub fn canonicalize_action(name: &str) -> Option<HostAction> {
    let trimmed = name.trim();
    let stripped = trimmed
        .strip_prefix("browser.")
        .or_else(|| trimmed.strip_prefix("browser_"))
        .unwrap_or(trimmed);
    let normalized = stripped.replace('.', "_");
    let action = match normalized.as_str() {
        "start" => HostAction::Start,
        "install" => HostAction::Install,
        "profiles" => HostAction::Profiles,
        "tabs" => HostAction::Tabs,
        "tabs_open" | "tabs_new" => HostAction::TabsOpen,
        "tabs_focus" => HostAction::TabsFocus,
        "tabs_close" | "tabs_delete" => HostAction::TabsClose,
        "snapshot" | "analyze_page" => HostAction::Snapshot,
        "act" | "execute_action" => HostAction::Act,
        "wait" => HostAction::Wait,
        "screenshot" | "capture_screenshot" => HostAction::Screenshot,
        "pdf" => HostAction::Pdf,
        "console" | "console_get" => HostAction::ConsoleGet,
        "errors" | "errors_get" => HostAction::ErrorsGet,
        "requests" | "requests_get" => HostAction::RequestsGet,
        "response_body" => HostAction::ResponseBody,
        "trace_start" => HostAction::TraceStart,
        "trace_stop" => HostAction::TraceStop,
        "highlight" => HostAction::Highlight,
        "dialog_arm" => HostAction::DialogArm,
        "file_chooser_arm" => HostAction::FileChooserArm,
        "download_wait" => HostAction::DownloadWait,
        "state" => HostAction::StateOp,
        "env" => HostAction::Env,
        "assert" => HostAction::Assert,
        "close" => HostAction::Close,
        _ => return None,
    };
    Some(action)
}

pub async fn execute_handler(
    State(state): State<AppState>,
    Json(envelope): Json<ExecuteEnvelope>,
) -> Result<Json<Value>, HostError> {
    let Some(action) = canonicalize_action(&envelope.action) else {
        return Err(HostError::invalid_input(format!(
            "unknown action: {}",
            envelope.action
        )));
    };
    let params = envelope.params;

    let result = match action {
        HostAction::Start => actions::session::start(&state, &params).await?,
        HostAction::Install => actions::session::install(&state, &params).await?,
        HostAction::Profiles => actions::session::profiles(&state, &params).await?,
        HostAction::Close => actions::session::close(&state, &params).await?,
        HostAction::Tabs => actions::tabs::list(&state, &params).await?,
        HostAction::TabsOpen => actions::tabs::open(&state, &params).await?,
        HostAction::TabsFocus => actions::tabs::focus(&state, &params).await?,
        HostAction::TabsClose => actions::tabs::close(&state, &params).await?,
        HostAction::Snapshot => actions::snapshot::snapshot(&state, &params).await?,
        HostAction::Act => actions::act::act(&state, &params).await?,
        HostAction::Wait => actions::wait::wait(&state, &params).await?,
        HostAction::Screenshot => actions::capture::screenshot(&state, &params).await?,
        HostAction::Pdf => actions::capture::pdf(&state, &params).await?,
        HostAction::ConsoleGet => actions::observe::console_get(&state, &params).await?,
        HostAction::ErrorsGet => actions::observe::errors_get(&state, &params).await?,
        HostAction::RequestsGet => actions::observe::requests_get(&state, &params).await?,
        HostAction::ResponseBody => actions::observe::response_body(&state, &params).await?,
        HostAction::TraceStart => actions::state_env::trace_start(&state, &params).await?,
        HostAction::TraceStop => actions::state_env::trace_stop(&state, &params).await?,
        HostAction::Highlight => actions::misc::highlight(&state, &params).await?,
        HostAction::DialogArm => actions::misc::dialog_arm(&state, &params).await?,
        HostAction::FileChooserArm => actions::misc::file_chooser_arm(&state, &params).await?,
        HostAction::DownloadWait => actions::misc::download_wait(&state, &params).await?,
        HostAction::StateOp => actions::state_env::state_op(&state, &params).await?,
        HostAction::Env => actions::state_env::env_op(&state, &params).await?,
        HostAction::Assert => actions::misc::assert_op(&state, &params).await?,
    };
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_resolve() {
        assert_eq!(canonicalize_action("browser_act"), Some(HostAction::Act));
        assert_eq!(canonicalize_action("act"), Some(HostAction::Act));
        assert_eq!(canonicalize_action("browser.act"), Some(HostAction::Act));
        assert_eq!(canonicalize_action("browser.tabs.open"), Some(HostAction::TabsOpen));
        assert_eq!(canonicalize_action("tabs.new"), Some(HostAction::TabsOpen));
        assert_eq!(canonicalize_action("browser_tabs_close"), Some(HostAction::TabsClose));
        assert_eq!(canonicalize_action("browser_snapshot"), Some(HostAction::Snapshot));
        assert_eq!(canonicalize_action("browser_state"), Some(HostAction::StateOp));
    }

    #[test]
    fn legacy_python_names_still_resolve() {
        assert_eq!(canonicalize_action("analyze_page"), Some(HostAction::Snapshot));
        assert_eq!(canonicalize_action("capture_screenshot"), Some(HostAction::Screenshot));
        assert_eq!(canonicalize_action("execute_action"), Some(HostAction::Act));
    }

    #[test]
    fn unknown_actions_are_rejected() {
        assert_eq!(canonicalize_action("browser_frobnicate"), None);
        assert_eq!(canonicalize_action(""), None);
    }
}
