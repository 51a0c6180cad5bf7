//! A named, long-lived browser session.
//!
//! The session owns the browser process, the page list and all per-session
//! state the host protocol exposes. A transient connectivity failure resets
//! the underlying browser while the session id, epoch counter and snapshot
//! cache survive.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, FileChooserOpenedMode, EventFileChooserOpened,
    HandleJavaScriptDialogParams, SetInterceptFileChooserDialogParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gaia_core_types::{SessionId, SnapshotId, SnapshotStore};

use crate::config::BrowserSessionConfig;
use crate::errors::SessionError;
use crate::launch::{apply_stealth, launch_browser, BrowserHandle};
use crate::observability::{attach_observability, DialogEntry, SessionObservability};
use crate::screencast::{start_screencast, ScreencastBroadcaster};
use crate::tabs::{resolve_tab_identifier, TabResolution};
use crate::trace::TraceRecorder;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogMode {
    #[default]
    Dismiss,
    Accept,
}

/// Dialog/file-chooser arming state shared with the event pumps.
#[derive(Debug, Default)]
pub struct ArmingState {
    pub dialog_mode: SyncMutex<DialogMode>,
    pub dialog_prompt_text: SyncMutex<String>,
    pub file_chooser_files: SyncMutex<Vec<PathBuf>>,
}

pub struct Session {
    pub id: SessionId,
    pub config: BrowserSessionConfig,
    browser: Option<BrowserHandle>,
    current_target: Option<String>,
    /// Monotonic snapshot counter; survives connection resets.
    pub snapshot_epoch: u64,
    pub snapshots: SnapshotStore,
    pub current_url: String,
    pub current_snapshot_id: Option<SnapshotId>,
    pub current_dom_hash: String,
    pub observability: Arc<SessionObservability>,
    pub arming: Arc<ArmingState>,
    pub stored_css_values: HashMap<String, String>,
    pub trace: Option<TraceRecorder>,
    screencast: Arc<ScreencastBroadcaster>,
    attached_targets: HashSet<String>,
    consecutive_recovery_failures: u32,
}

impl Session {
    pub fn new(
        id: SessionId,
        config: BrowserSessionConfig,
        screencast: Arc<ScreencastBroadcaster>,
    ) -> Self {
        Self {
            id,
            config,
            browser: None,
            current_target: None,
            snapshot_epoch: 0,
            snapshots: SnapshotStore::new(),
            current_url: String::new(),
            current_snapshot_id: None,
            current_dom_hash: String::new(),
            observability: Arc::new(SessionObservability::default()),
            arming: Arc::new(ArmingState::default()),
            stored_css_values: HashMap::new(),
            trace: None,
            screencast,
            attached_targets: HashSet::new(),
            consecutive_recovery_failures: 0,
        }
    }

    pub fn next_epoch(&mut self) -> u64 {
        self.snapshot_epoch += 1;
        self.snapshot_epoch
    }

    pub fn is_launched(&self) -> bool {
        self.browser.is_some()
    }

    /// Launch the browser if needed and return the current page.
    pub async fn current_page(&mut self) -> Result<Page, SessionError> {
        if self.browser.is_none() {
            let (handle, page) = launch_browser(&self.config).await?;
            info!(session = %self.id, "browser launched");
            self.browser = Some(handle);
            self.current_target = Some(page.target_id().as_ref().to_string());
            self.attach_page(&page).await?;
            return Ok(page);
        }

        let pages = self.pages().await?;
        if let Some(target) = &self.current_target {
            if let Some(page) = pages
                .iter()
                .find(|p| p.target_id().as_ref() == target.as_str())
            {
                return Ok(page.clone());
            }
        }
        match pages.into_iter().next() {
            Some(page) => {
                self.set_current(&page).await?;
                Ok(page)
            }
            None => {
                let browser = self
                    .browser
                    .as_ref()
                    .ok_or(SessionError::PageUnavailable)?;
                let page = browser.browser.new_page("about:blank").await?;
                apply_stealth(&page).await?;
                self.set_current(&page).await?;
                Ok(page)
            }
        }
    }

    pub async fn pages(&self) -> Result<Vec<Page>, SessionError> {
        let browser = self.browser.as_ref().ok_or(SessionError::PageUnavailable)?;
        Ok(browser.browser.pages().await?)
    }

    pub async fn current_tab_index(&mut self) -> Result<usize, SessionError> {
        let current = self.current_page().await?;
        let pages = self.pages().await?;
        Ok(pages
            .iter()
            .position(|p| p.target_id() == current.target_id())
            .unwrap_or(0))
    }

    /// Make `page` the session's current tab and wire its listeners.
    pub async fn set_current(&mut self, page: &Page) -> Result<(), SessionError> {
        self.current_target = Some(page.target_id().as_ref().to_string());
        self.attach_page(page).await
    }

    /// Resolve an optional tab identifier to a page, falling back to the
    /// current one. A stale identifier with a single open tab recovers to
    /// that tab instead of failing.
    pub async fn resolve_page(
        &mut self,
        tab_identifier: Option<&serde_json::Value>,
    ) -> Result<(Page, usize), SessionError> {
        let current = self.current_page().await?;
        let Some(identifier) = tab_identifier else {
            let index = self.current_tab_index().await?;
            return Ok((current, index));
        };
        if identifier.is_null() {
            let index = self.current_tab_index().await?;
            return Ok((current, index));
        }

        let pages = self.pages().await?;
        match resolve_tab_identifier(&pages, identifier).await {
            TabResolution::Resolved { index, page } => {
                self.set_current(&page).await?;
                Ok((page, index))
            }
            TabResolution::Ambiguous { matches } => {
                Err(SessionError::AmbiguousTarget { matches })
            }
            TabResolution::NotFound if pages.len() == 1 => {
                let page = pages.into_iter().next().ok_or(SessionError::PageUnavailable)?;
                self.set_current(&page).await?;
                Ok((page, 0))
            }
            TabResolution::NotFound => Err(SessionError::TabNotFound(identifier.to_string())),
        }
    }

    /// Open a new tab, optionally at a URL, and make it current.
    pub async fn open_tab(&mut self, url: Option<&str>) -> Result<(Page, usize), SessionError> {
        self.current_page().await?;
        let browser = self.browser.as_ref().ok_or(SessionError::PageUnavailable)?;
        let page = browser
            .browser
            .new_page(url.unwrap_or("about:blank"))
            .await?;
        apply_stealth(&page).await?;
        self.set_current(&page).await?;
        let index = self.current_tab_index().await?;
        Ok((page, index))
    }

    /// Close a tab. Closing the current tab falls back to the first
    /// remaining page.
    pub async fn close_tab(&mut self, page: Page) -> Result<(), SessionError> {
        let closed_target = page.target_id().as_ref().to_string();
        page.close().await?;
        self.attached_targets.remove(&closed_target);
        if self.current_target.as_deref() == Some(closed_target.as_str()) {
            self.current_target = None;
        }
        Ok(())
    }

    /// Wire observability, dialog handling, file-chooser interception and
    /// the screencast pump onto a page, once per target.
    async fn attach_page(&mut self, page: &Page) -> Result<(), SessionError> {
        let target = page.target_id().as_ref().to_string();
        if !self.attached_targets.insert(target) {
            return Ok(());
        }

        attach_observability(page, Arc::clone(&self.observability)).await?;
        self.attach_dialog_listener(page).await?;
        self.attach_file_chooser(page).await?;
        if let Err(err) = start_screencast(
            page,
            self.id.to_string(),
            Arc::clone(&self.screencast),
        )
        .await
        {
            // Screencast is best-effort; a page that refuses it still works.
            warn!(session = %self.id, %err, "screencast start failed");
        }
        Ok(())
    }

    async fn attach_dialog_listener(&self, page: &Page) -> Result<(), SessionError> {
        let mut dialogs = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let arming = Arc::clone(&self.arming);
        let observability = Arc::clone(&self.observability);
        let dialog_page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                let mode = *arming.dialog_mode.lock();
                let prompt_text = arming.dialog_prompt_text.lock().clone();
                let accept = mode == DialogMode::Accept;
                let mut entry = DialogEntry {
                    ts: chrono::Utc::now().timestamp_millis(),
                    kind: format!("{:?}", event.r#type).to_lowercase(),
                    message: event.message.clone(),
                    mode: if accept { "accept".into() } else { "dismiss".into() },
                    error: None,
                };
                let mut params = HandleJavaScriptDialogParams::new(accept);
                if accept && !prompt_text.is_empty() {
                    params.prompt_text = Some(prompt_text);
                }
                if let Err(err) = dialog_page.execute(params).await {
                    entry.error = Some(err.to_string());
                }
                observability.add_dialog_event(entry);
            }
        });
        Ok(())
    }

    async fn attach_file_chooser(&self, page: &Page) -> Result<(), SessionError> {
        page.execute(SetInterceptFileChooserDialogParams::new(true))
            .await?;
        let mut choosers = page.event_listener::<EventFileChooserOpened>().await?;
        let arming = Arc::clone(&self.arming);
        let observability = Arc::clone(&self.observability);
        let chooser_page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = choosers.next().await {
                let files: Vec<String> = arming
                    .file_chooser_files
                    .lock()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                if files.is_empty() {
                    continue;
                }
                if event.mode != FileChooserOpenedMode::SelectSingle
                    && event.mode != FileChooserOpenedMode::SelectMultiple
                {
                    continue;
                }
                let Some(backend_node_id) = event.backend_node_id.clone() else {
                    continue;
                };
                let params = SetFileInputFilesParams::builder()
                    .files(files.clone())
                    .backend_node_id(backend_node_id)
                    .build();
                match params {
                    Ok(params) => {
                        if let Err(err) = chooser_page.execute(params).await {
                            observability.add_dialog_event(DialogEntry {
                                ts: chrono::Utc::now().timestamp_millis(),
                                kind: "file_chooser".into(),
                                message: files.join(", "),
                                mode: String::new(),
                                error: Some(err.to_string()),
                            });
                        }
                    }
                    Err(err) => {
                        observability.add_dialog_event(DialogEntry {
                            ts: chrono::Utc::now().timestamp_millis(),
                            kind: "file_chooser".into(),
                            message: files.join(", "),
                            mode: String::new(),
                            error: Some(err),
                        });
                    }
                }
            }
        });
        Ok(())
    }

    /// Evaluate with a wall-clock cap. A timeout poisons the connection:
    /// the browser is reset while the session id and epoch survive.
    pub async fn evaluate_with_timeout(
        &mut self,
        page: &Page,
        expression: &str,
        timeout_ms: u64,
    ) -> Result<serde_json::Value, SessionError> {
        let fut = page.evaluate(expression);
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(Ok(result)) => Ok(result.into_value().unwrap_or(serde_json::Value::Null)),
            Ok(Err(err)) => Err(SessionError::from(err)),
            Err(_) => {
                warn!(session = %self.id, "evaluate timed out; resetting browser connection");
                self.reset_connection().await;
                Err(SessionError::EvaluateTimeout(timeout_ms))
            }
        }
    }

    /// Tear down the browser process but keep the session identity and
    /// snapshot history.
    pub async fn reset_connection(&mut self) {
        if let Some(handle) = self.browser.take() {
            handle.shutdown().await;
        }
        self.current_target = None;
        self.attached_targets.clear();
        debug!(session = %self.id, "browser connection reset");
    }

    pub fn record_recovery_failure(&mut self) -> u32 {
        self.consecutive_recovery_failures += 1;
        self.consecutive_recovery_failures
    }

    pub fn clear_recovery_failures(&mut self) {
        self.consecutive_recovery_failures = 0;
    }

    pub async fn close(&mut self) {
        if let Some(trace) = self.trace.take() {
            if let Err(err) = trace.abandon().await {
                debug!(session = %self.id, %err, "trace abandon failed");
            }
        }
        self.reset_connection().await;
        info!(session = %self.id, "session closed");
    }
}
