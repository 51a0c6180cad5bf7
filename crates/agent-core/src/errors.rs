//! Agent-layer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("vision provider error: {0}")]
    Provider(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AgentError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Gateway(err.to_string())
    }
}
