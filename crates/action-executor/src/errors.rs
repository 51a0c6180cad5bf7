//! Executor-internal errors.
//!
//! These never leak to callers directly: the executor folds every failure
//! into an `ActionResult` with a reason code.

use gaia_core_types::ReasonCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("session error: {0}")]
    Session(#[from] browser_session::SessionError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] snapshot_engine::SnapshotError),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ExecError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            ExecError::Session(err) => err.reason_code(),
            ExecError::Snapshot(err) => err.reason_code(),
            ExecError::Interaction(_) => ReasonCode::NotActionable,
            ExecError::InvalidInput(_) => ReasonCode::InvalidInput,
        }
    }
}
