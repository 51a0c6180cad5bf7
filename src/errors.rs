//! HTTP-facing error type.
//!
//! Every non-success response carries `success=false`, `effective=false`, a
//! reason code from the closed set and a human-readable reason. Structured
//! detail rides under `detail` for 4xx responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use browser_session::SessionError;
use gaia_core_types::ReasonCode;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct HostError {
    pub status: StatusCode,
    pub reason_code: ReasonCode,
    pub message: String,
    pub extra: Option<Value>,
}

impl HostError {
    pub fn new(status: StatusCode, reason_code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            status,
            reason_code,
            message: message.into(),
            extra: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ReasonCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ReasonCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ReasonCode::UnknownError,
            message,
        )
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Structured detail payload for the 4xx/5xx body.
    fn detail(&self) -> Value {
        let mut detail = json!({
            "reason_code": self.reason_code,
            "message": self.message,
        });
        if let Some(extra) = &self.extra {
            if let (Some(obj), Some(extra_obj)) = (detail.as_object_mut(), extra.as_object()) {
                for (k, v) in extra_obj {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }
        detail
    }
}

impl From<SessionError> for HostError {
    fn from(err: SessionError) -> Self {
        let reason_code = err.reason_code();
        let status = match &err {
            SessionError::AmbiguousTarget { .. } | SessionError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            SessionError::TabNotFound(_) | SessionError::PageUnavailable => StatusCode::NOT_FOUND,
            SessionError::PathOutsideDataRoot(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let extra = match &err {
            SessionError::AmbiguousTarget { matches } => Some(json!({ "matches": matches })),
            _ => None,
        };
        Self {
            status,
            reason_code,
            message: err.to_string(),
            extra,
        }
    }
}

impl From<snapshot_engine::SnapshotError> for HostError {
    fn from(err: snapshot_engine::SnapshotError) -> Self {
        match err {
            snapshot_engine::SnapshotError::Session(inner) => inner.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for HostError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "effective": false,
            "reason_code": self.reason_code,
            "reason": self.message,
            "detail": self.detail(),
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_target_carries_the_match_list() {
        let err: HostError = SessionError::AmbiguousTarget {
            matches: vec!["ABCD1111".into(), "ABCD2222".into()],
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.reason_code, ReasonCode::AmbiguousTargetId);
        let detail = err.detail();
        assert_eq!(detail["matches"][0], "ABCD1111");
        assert_eq!(detail["reason_code"], "ambiguous_target_id");
    }

    #[test]
    fn data_root_escape_maps_to_not_actionable() {
        let err: HostError = SessionError::PathOutsideDataRoot("/etc/passwd".into()).into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.reason_code, ReasonCode::NotActionable);
    }
}
