//! The closed set of reason codes every host response carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome classification for every host operation.
///
/// The set is closed: callers match exhaustively and the wire format is the
/// snake_case name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Ok,
    RefRequired,
    SnapshotNotFound,
    StaleSnapshot,
    StaleRefRecovered,
    NotFound,
    NotActionable,
    NoStateChange,
    AmbiguousRefTarget,
    TabScopeMismatch,
    FrameScopeMismatch,
    AmbiguousTargetId,
    ActionTimeout,
    LegacySelectorForbidden,
    InvalidInput,
    Http4xx,
    Http5xx,
    UnknownError,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Ok => "ok",
            ReasonCode::RefRequired => "ref_required",
            ReasonCode::SnapshotNotFound => "snapshot_not_found",
            ReasonCode::StaleSnapshot => "stale_snapshot",
            ReasonCode::StaleRefRecovered => "stale_ref_recovered",
            ReasonCode::NotFound => "not_found",
            ReasonCode::NotActionable => "not_actionable",
            ReasonCode::NoStateChange => "no_state_change",
            ReasonCode::AmbiguousRefTarget => "ambiguous_ref_target",
            ReasonCode::TabScopeMismatch => "tab_scope_mismatch",
            ReasonCode::FrameScopeMismatch => "frame_scope_mismatch",
            ReasonCode::AmbiguousTargetId => "ambiguous_target_id",
            ReasonCode::ActionTimeout => "action_timeout",
            ReasonCode::LegacySelectorForbidden => "legacy_selector_forbidden",
            ReasonCode::InvalidInput => "invalid_input",
            ReasonCode::Http4xx => "http_4xx",
            ReasonCode::Http5xx => "http_5xx",
            ReasonCode::UnknownError => "unknown_error",
        }
    }

    /// Programmer errors surface unchanged and are never retried locally.
    pub fn is_programmer_error(self) -> bool {
        matches!(
            self,
            ReasonCode::LegacySelectorForbidden
                | ReasonCode::InvalidInput
                | ReasonCode::RefRequired
        )
    }

    pub fn is_success(self) -> bool {
        matches!(self, ReasonCode::Ok | ReasonCode::StaleRefRecovered)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "ok" => ReasonCode::Ok,
            "ref_required" => ReasonCode::RefRequired,
            "snapshot_not_found" => ReasonCode::SnapshotNotFound,
            "stale_snapshot" => ReasonCode::StaleSnapshot,
            "stale_ref_recovered" => ReasonCode::StaleRefRecovered,
            "not_found" => ReasonCode::NotFound,
            "not_actionable" => ReasonCode::NotActionable,
            "no_state_change" => ReasonCode::NoStateChange,
            "ambiguous_ref_target" => ReasonCode::AmbiguousRefTarget,
            "tab_scope_mismatch" => ReasonCode::TabScopeMismatch,
            "frame_scope_mismatch" => ReasonCode::FrameScopeMismatch,
            "ambiguous_target_id" => ReasonCode::AmbiguousTargetId,
            "action_timeout" => ReasonCode::ActionTimeout,
            "legacy_selector_forbidden" => ReasonCode::LegacySelectorForbidden,
            "invalid_input" => ReasonCode::InvalidInput,
            "http_4xx" => ReasonCode::Http4xx,
            "http_5xx" => ReasonCode::Http5xx,
            "unknown_error" => ReasonCode::UnknownError,
            _ => return Err(()),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_snake_case() {
        let json = serde_json::to_string(&ReasonCode::LegacySelectorForbidden).unwrap();
        assert_eq!(json, "\"legacy_selector_forbidden\"");
        let back: ReasonCode = serde_json::from_str("\"tab_scope_mismatch\"").unwrap();
        assert_eq!(back, ReasonCode::TabScopeMismatch);
    }

    #[test]
    fn as_str_round_trips_through_from_str() {
        let all = [
            ReasonCode::Ok,
            ReasonCode::RefRequired,
            ReasonCode::SnapshotNotFound,
            ReasonCode::StaleSnapshot,
            ReasonCode::StaleRefRecovered,
            ReasonCode::NotFound,
            ReasonCode::NotActionable,
            ReasonCode::NoStateChange,
            ReasonCode::AmbiguousRefTarget,
            ReasonCode::TabScopeMismatch,
            ReasonCode::FrameScopeMismatch,
            ReasonCode::AmbiguousTargetId,
            ReasonCode::ActionTimeout,
            ReasonCode::LegacySelectorForbidden,
            ReasonCode::InvalidInput,
            ReasonCode::Http4xx,
            ReasonCode::Http5xx,
            ReasonCode::UnknownError,
        ];
        for code in all {
            assert_eq!(code.as_str().parse::<ReasonCode>().unwrap(), code);
        }
    }

    #[test]
    fn programmer_errors_are_flagged() {
        assert!(ReasonCode::InvalidInput.is_programmer_error());
        assert!(ReasonCode::LegacySelectorForbidden.is_programmer_error());
        assert!(!ReasonCode::StaleSnapshot.is_programmer_error());
    }
}
