//! Shared server state.

use std::sync::Arc;

use action_executor::ExecutorConfig;
use browser_session::{ScreencastBroadcaster, SessionRegistry};
use snapshot_engine::CaptureOptions;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub screencast: Arc<ScreencastBroadcaster>,
    pub config: Arc<AppConfig>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let screencast = Arc::new(ScreencastBroadcaster::new());
        let registry = Arc::new(SessionRegistry::new(
            config.session_config(),
            Arc::clone(&screencast),
        ));
        Self {
            registry,
            screencast,
            config: Arc::new(config),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            max_elements: self.config.browser.max_elements,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_action_seconds: self.config.browser.max_action_seconds,
            capture: self.capture_options(),
        }
    }
}
