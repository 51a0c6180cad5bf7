//! Vision model providers.
//!
//! The loop consumes the model as a pure function: prompt plus optional
//! screenshot in, text out. Credential resolution lives outside the core;
//! the HTTP provider only carries the resulting bearer token.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::AgentError;

#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Analyze a prompt with an optional base64 PNG screenshot and return
    /// the raw model text.
    async fn analyze_with_vision(
        &self,
        prompt: &str,
        screenshot_base64: Option<&str>,
    ) -> Result<String, AgentError>;
}

#[async_trait]
impl VisionProvider for Box<dyn VisionProvider> {
    async fn analyze_with_vision(
        &self,
        prompt: &str,
        screenshot_base64: Option<&str>,
    ) -> Result<String, AgentError> {
        (**self).analyze_with_vision(prompt, screenshot_base64).await
    }
}

/// Deterministic provider for tests and offline development. Replies are
/// served in order; when the script runs dry it signals goal achievement.
#[derive(Debug, Default)]
pub struct MockVisionProvider {
    replies: Mutex<VecDeque<String>>,
}

impl MockVisionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn analyze_with_vision(
        &self,
        _prompt: &str,
        _screenshot_base64: Option<&str>,
    ) -> Result<String, AgentError> {
        let mut replies = self.replies.lock().await;
        Ok(replies.pop_front().unwrap_or_else(|| {
            r#"{"action":"wait","reasoning":"script exhausted","confidence":1.0,"is_goal_achieved":true,"goal_achievement_reason":"mock script exhausted"}"#
                .to_string()
        }))
    }
}

/// HTTP-backed provider. Posts `{model, prompt, image?}` with a bearer token
/// and expects `{text}` back.
pub struct HttpVisionProvider {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: String,
    model: String,
}

impl HttpVisionProvider {
    pub fn new(
        endpoint: impl Into<String>,
        bearer_token: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bearer_token: bearer_token.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl VisionProvider for HttpVisionProvider {
    async fn analyze_with_vision(
        &self,
        prompt: &str,
        screenshot_base64: Option<&str>,
    ) -> Result<String, AgentError> {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
        });
        if let Some(image) = screenshot_base64 {
            body["image"] = json!(image);
        }
        debug!(endpoint = %self.endpoint, "vision request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AgentError::Provider(format!(
                "vision endpoint returned {}",
                response.status()
            )));
        }
        let payload: Value = response.json().await?;
        payload
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AgentError::Provider("vision reply missing `text`".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_serves_scripted_replies_then_signals_done() {
        let provider = MockVisionProvider::scripted(["first", "second"]);
        assert_eq!(provider.analyze_with_vision("p", None).await.unwrap(), "first");
        assert_eq!(provider.analyze_with_vision("p", None).await.unwrap(), "second");
        let exhausted = provider.analyze_with_vision("p", None).await.unwrap();
        assert!(exhausted.contains("is_goal_achieved"));
    }
}
