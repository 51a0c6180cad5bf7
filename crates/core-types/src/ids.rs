//! Identifier newtypes.
//!
//! Snapshot ids encode the session, the epoch and a dom-hash prefix so the
//! executor can detect staleness without fetching anything. Ref ids encode
//! the tab/frame scope and the element index inside one snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of dom-hash characters embedded in a snapshot id.
pub const SNAPSHOT_HASH_PREFIX_LEN: usize = 12;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed components of a snapshot id (`{session}:{epoch}:{hash12}`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotIdParts {
    pub session: String,
    pub epoch: u64,
    pub hash_prefix: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn compose(session: &str, epoch: u64, dom_hash: &str) -> Self {
        let prefix: String = dom_hash.chars().take(SNAPSHOT_HASH_PREFIX_LEN).collect();
        Self(format!("{session}:{epoch}:{prefix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into session/epoch/hash-prefix. Session ids may themselves
    /// contain `:`; the epoch and hash are always the last two segments.
    pub fn parse(&self) -> Option<SnapshotIdParts> {
        let mut it = self.0.rsplitn(3, ':');
        let hash_prefix = it.next()?.to_string();
        let epoch = it.next()?.parse::<u64>().ok()?;
        let session = it.next()?.to_string();
        if session.is_empty() || hash_prefix.is_empty() {
            return None;
        }
        Some(SnapshotIdParts {
            session,
            epoch,
            hash_prefix,
        })
    }
}

impl From<&str> for SnapshotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope encoded inside a ref id (`t{tab}-f{frame}-e{index}`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefScope {
    pub tab_index: usize,
    pub frame_index: usize,
    pub element_index: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RefId(pub String);

impl RefId {
    pub fn compose(tab_index: usize, frame_index: usize, element_index: usize) -> Self {
        Self(format!("t{tab_index}-f{frame_index}-e{element_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> Option<RefScope> {
        let mut parts = self.0.split('-');
        let tab = parts.next()?.strip_prefix('t')?.parse().ok()?;
        let frame = parts.next()?.strip_prefix('f')?.parse().ok()?;
        let elem = parts.next()?.strip_prefix('e')?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(RefScope {
            tab_index: tab,
            frame_index: frame,
            element_index: elem,
        })
    }
}

impl From<&str> for RefId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_id_round_trips() {
        let id = SnapshotId::compose("s1", 7, "abcdef0123456789");
        assert_eq!(id.as_str(), "s1:7:abcdef012345");
        let parts = id.parse().unwrap();
        assert_eq!(parts.session, "s1");
        assert_eq!(parts.epoch, 7);
        assert_eq!(parts.hash_prefix, "abcdef012345");
    }

    #[test]
    fn snapshot_id_allows_colons_in_session() {
        let id = SnapshotId::compose("tenant:alpha", 3, "0123456789abcdef");
        let parts = id.parse().unwrap();
        assert_eq!(parts.session, "tenant:alpha");
        assert_eq!(parts.epoch, 3);
    }

    #[test]
    fn snapshot_id_rejects_garbage() {
        assert!(SnapshotId::from("not-a-snapshot-id").parse().is_none());
        assert!(SnapshotId::from("s1:notanumber:abc").parse().is_none());
    }

    #[test]
    fn ref_id_round_trips() {
        let id = RefId::compose(1, 0, 42);
        assert_eq!(id.as_str(), "t1-f0-e42");
        let scope = id.parse().unwrap();
        assert_eq!(scope.tab_index, 1);
        assert_eq!(scope.frame_index, 0);
        assert_eq!(scope.element_index, 42);
    }

    #[test]
    fn ref_id_rejects_malformed() {
        assert!(RefId::from("t1-f0").parse().is_none());
        assert!(RefId::from("x1-f0-e2").parse().is_none());
        assert!(RefId::from("t1-f0-e2-extra").parse().is_none());
    }
}
