//! Snapshot-layer errors.

use gaia_core_types::ReasonCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("page evaluation failed: {0}")]
    Evaluate(String),

    #[error("session error: {0}")]
    Session(#[from] browser_session::SessionError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SnapshotError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            SnapshotError::Evaluate(_) => ReasonCode::UnknownError,
            SnapshotError::Session(err) => err.reason_code(),
            SnapshotError::InvalidInput(_) => ReasonCode::InvalidInput,
        }
    }
}
