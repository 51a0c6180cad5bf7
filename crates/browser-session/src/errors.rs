//! Session-layer error taxonomy.

use gaia_core_types::ReasonCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("no page available for session")]
    PageUnavailable,

    #[error("evaluate timed out after {0} ms")]
    EvaluateTimeout(u64),

    #[error("ambiguous target id prefix")]
    AmbiguousTarget { matches: Vec<String> },

    #[error("tab not found: {0}")]
    TabNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("path escapes the data root: {0}")]
    PathOutsideDataRoot(String),

    #[error("cdp error: {0}")]
    Cdp(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            SessionError::LaunchFailed(_) => ReasonCode::UnknownError,
            SessionError::PageUnavailable => ReasonCode::NotFound,
            SessionError::EvaluateTimeout(_) => ReasonCode::ActionTimeout,
            SessionError::AmbiguousTarget { .. } => ReasonCode::AmbiguousTargetId,
            SessionError::TabNotFound(_) => ReasonCode::NotFound,
            SessionError::InvalidInput(_) => ReasonCode::InvalidInput,
            SessionError::PathOutsideDataRoot(_) => ReasonCode::NotActionable,
            SessionError::Cdp(_) => ReasonCode::UnknownError,
            SessionError::Io(_) => ReasonCode::UnknownError,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for SessionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SessionError::Cdp(err.to_string())
    }
}
