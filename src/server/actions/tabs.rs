//! Tab lifecycle operations.
//!
//! Every tab operation returns the current tab payload plus the full list
//! so callers never recompute it.

use serde_json::{json, Value};

use browser_session::tabs::tabs_payload;

use crate::errors::HostError;
use crate::server::actions::{session_id, str_param, tab_identifier};
use crate::server::state::AppState;

async fn tabs_response(
    session: &mut browser_session::Session,
    current_index: usize,
) -> Result<Value, HostError> {
    let pages = session.pages().await?;
    let tabs = tabs_payload(&pages, current_index).await;
    let current = tabs.get(current_index).cloned();
    Ok(json!({
        "success": true,
        "reason_code": "ok",
        "current_tab": current,
        "current_tab_id": current_index,
        "tabs": tabs,
    }))
}

pub async fn list(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let (_, index) = session.resolve_page(tab_identifier(params).as_ref()).await?;
    tabs_response(&mut session, index).await
}

pub async fn open(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let url = str_param(params, "url");
    let (_, index) = session.open_tab(url.as_deref()).await?;
    tabs_response(&mut session, index).await
}

pub async fn focus(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let identifier = tab_identifier(params)
        .ok_or_else(|| HostError::invalid_input("tabs.focus requires targetId, tab_id or index"))?;
    let (page, index) = session.resolve_page(Some(&identifier)).await?;
    page.bring_to_front()
        .await
        .map_err(|err| HostError::internal(err.to_string()))?;
    tabs_response(&mut session, index).await
}

pub async fn close(state: &AppState, params: &Value) -> Result<Value, HostError> {
    let handle = state.registry.get_or_create(&session_id(params));
    let mut session = handle.lock().await;
    let identifier = tab_identifier(params)
        .ok_or_else(|| HostError::invalid_input("tabs.close requires targetId, tab_id or index"))?;
    let (page, _) = session.resolve_page(Some(&identifier)).await?;
    session.close_tab(page).await?;
    let index = session.current_tab_index().await?;
    tabs_response(&mut session, index).await
}
