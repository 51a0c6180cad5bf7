//! Browser host gateway.
//!
//! The loop talks to the host through this trait only, naming elements by
//! `(snapshot_id, ref_id)` and never by selector. The HTTP implementation
//! speaks the host's `/execute` envelope.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use gaia_core_types::{ActionResult, DecisionAction, ReasonCode};

use crate::errors::AgentError;
use crate::view::PageView;

/// One action as the loop hands it to the host.
#[derive(Clone, Debug)]
pub struct GatewayAction {
    pub snapshot_id: String,
    pub ref_id: Option<String>,
    pub kind: DecisionAction,
    pub value: Option<String>,
}

#[async_trait]
pub trait BrowserGateway: Send + Sync {
    /// Snapshot the current page (navigating first when `url` is given).
    async fn snapshot(&self, url: Option<&str>) -> Result<PageView, AgentError>;

    /// Viewport screenshot as base64 PNG, when available.
    async fn screenshot(&self) -> Result<Option<String>, AgentError>;

    /// Execute one action.
    async fn act(&self, action: GatewayAction) -> Result<ActionResult, AgentError>;

    /// Recent page errors, newest last.
    async fn page_errors(&self, limit: usize) -> Result<Vec<String>, AgentError>;
}

/// Gateway over HTTP: `POST {base_url}/execute` with `{action, params}`.
pub struct HttpBrowserGateway {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl HttpBrowserGateway {
    pub fn new(base_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            session_id: session_id.into(),
        }
    }

    async fn execute(&self, action: &str, params: Value) -> Result<Value, AgentError> {
        let url = format!("{}/execute", self.base_url.trim_end_matches('/'));
        debug!(action, "host call");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "action": action, "params": params }))
            .send()
            .await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let reason = payload
                .get("detail")
                .and_then(|d| d.get("reason_code"))
                .and_then(Value::as_str)
                .unwrap_or("http error");
            return Err(AgentError::Gateway(format!("{action}: {status} ({reason})")));
        }
        Ok(payload)
    }
}

#[async_trait]
impl BrowserGateway for HttpBrowserGateway {
    async fn snapshot(&self, url: Option<&str>) -> Result<PageView, AgentError> {
        let mut params = json!({ "session_id": self.session_id, "format": "ref" });
        if let Some(url) = url {
            params["url"] = json!(url);
        }
        let payload = self.execute("browser_snapshot", params).await?;
        Ok(PageView::from_snapshot_payload(&payload))
    }

    async fn screenshot(&self) -> Result<Option<String>, AgentError> {
        let payload = self
            .execute(
                "browser_screenshot",
                json!({ "session_id": self.session_id }),
            )
            .await?;
        Ok(payload
            .get("screenshot")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn act(&self, action: GatewayAction) -> Result<ActionResult, AgentError> {
        let payload = match action.kind {
            DecisionAction::Navigate => {
                let url = action.value.clone().unwrap_or_default();
                self.execute(
                    "browser_start",
                    json!({ "session_id": self.session_id, "url": url }),
                )
                .await?
            }
            DecisionAction::Wait => {
                self.execute(
                    "browser_wait",
                    json!({ "session_id": self.session_id, "time_ms": 1000 }),
                )
                .await?
            }
            _ => {
                let kind = match action.kind {
                    DecisionAction::Click => "click",
                    DecisionAction::Fill => "fill",
                    DecisionAction::Press => "press",
                    DecisionAction::Hover => "hover",
                    DecisionAction::Select => "select",
                    DecisionAction::Scroll => "scroll",
                    DecisionAction::Navigate | DecisionAction::Wait => unreachable!(),
                };
                let mut params = json!({
                    "session_id": self.session_id,
                    "snapshot_id": action.snapshot_id,
                    "kind": kind,
                });
                if let Some(ref_id) = &action.ref_id {
                    params["ref_id"] = json!(ref_id);
                }
                if let Some(value) = &action.value {
                    params["value"] = json!(value);
                }
                self.execute("browser_act", params).await?
            }
        };

        Ok(serde_json::from_value(payload.clone()).unwrap_or_else(|_| ActionResult {
            success: payload.get("success").and_then(Value::as_bool).unwrap_or(false),
            ..ActionResult::failure(ReasonCode::UnknownError, "unparseable host reply")
        }))
    }

    async fn page_errors(&self, limit: usize) -> Result<Vec<String>, AgentError> {
        let payload = self
            .execute(
                "browser_errors_get",
                json!({ "session_id": self.session_id, "limit": limit }),
            )
            .await?;
        Ok(payload
            .get("entries")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("text").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
