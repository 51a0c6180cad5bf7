//! Session registry.
//!
//! Sessions are independent and proceed in parallel; within one session every
//! operation runs under the handle's async mutex, which also serializes
//! first-touch browser launch for concurrent requests naming the same id.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use gaia_core_types::SessionId;

use crate::config::BrowserSessionConfig;
use crate::screencast::ScreencastBroadcaster;
use crate::session::Session;

pub struct SessionHandle {
    inner: Mutex<Session>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.inner.lock().await
    }
}

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
    config: BrowserSessionConfig,
    screencast: Arc<ScreencastBroadcaster>,
}

impl SessionRegistry {
    pub fn new(config: BrowserSessionConfig, screencast: Arc<ScreencastBroadcaster>) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            screencast,
        }
    }

    /// Resolve or create the session for an id. Creation is idempotent:
    /// concurrent first-touch requests share one entry, and the browser
    /// itself launches lazily under the session mutex.
    pub fn get_or_create(&self, id: &SessionId) -> Arc<SessionHandle> {
        if let Some(existing) = self.sessions.get(id.as_str()) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .sessions
            .entry(id.as_str().to_string())
            .or_insert_with(|| {
                info!(session = %id, "creating session");
                Arc::new(SessionHandle::new(Session::new(
                    id.clone(),
                    self.config.clone(),
                    Arc::clone(&self.screencast),
                )))
            });
        Arc::clone(entry.value())
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id.as_str()).map(|e| Arc::clone(e.value()))
    }

    /// Remove and close a session. Returns whether it existed.
    pub async fn close(&self, id: &SessionId) -> bool {
        let Some((_, handle)) = self.sessions.remove(id.as_str()) else {
            return false;
        };
        handle.lock().await.close().await;
        true
    }

    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.close(&SessionId(id)).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn screencast(&self) -> Arc<ScreencastBroadcaster> {
        Arc::clone(&self.screencast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            BrowserSessionConfig::default(),
            Arc::new(ScreencastBroadcaster::new()),
        )
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = registry();
        let id = SessionId::from("s1");
        let a = registry.get_or_create(&id);
        let b = registry.get_or_create(&id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn close_removes_the_session() {
        let registry = registry();
        let id = SessionId::from("s1");
        registry.get_or_create(&id);
        assert!(registry.close(&id).await);
        assert!(!registry.close(&id).await);
        assert!(registry.is_empty());
    }
}
