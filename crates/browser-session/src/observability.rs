//! Per-session observability ring buffers and the CDP event pumps that feed
//! them.
//!
//! Buffer overflow evicts the oldest entry and is never an error; a pump
//! that loses its page simply ends.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, EventExceptionThrown};
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::SessionError;

pub const RING_BUFFER_CAP: usize = 800;

/// Fixed-capacity FIFO. Push beyond capacity evicts the oldest entry.
#[derive(Debug)]
pub struct RingBuffer<T> {
    entries: VecDeque<T>,
    cap: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent `limit` entries, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<T>
    where
        T: Clone,
    {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(RING_BUFFER_CAP)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestEntry {
    pub request_id: String,
    pub ts: i64,
    pub stage: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default)]
    pub resource_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DialogEntry {
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub ts: i64,
    pub guid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub suggested_filename: String,
    #[serde(default)]
    pub state: String,
}

/// Ring buffers for one session. Shared with the spawned event pumps.
#[derive(Debug, Default)]
pub struct SessionObservability {
    pub console: Mutex<RingBuffer<ConsoleEntry>>,
    pub errors: Mutex<RingBuffer<ConsoleEntry>>,
    pub requests: Mutex<RingBuffer<RequestEntry>>,
    pub dialogs: Mutex<RingBuffer<DialogEntry>>,
    pub downloads: Mutex<RingBuffer<DownloadEntry>>,
    request_seq: AtomicU64,
    /// Synthetic request id -> CDP network request id, for body fetches.
    cdp_request_ids: Mutex<HashMap<String, String>>,
}

impl SessionObservability {
    pub fn add_dialog_event(&self, entry: DialogEntry) {
        self.dialogs.lock().push(entry);
    }

    pub fn add_download_event(&self, entry: DownloadEntry) {
        self.downloads.lock().push(entry);
    }

    fn next_request_id(&self) -> String {
        let seq = self.request_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("req_{seq}")
    }

    fn cdp_request_id(&self, request_id: &str) -> Option<String> {
        self.cdp_request_ids.lock().get(request_id).cloned()
    }

    /// Fetch a captured response body via the live page.
    pub async fn response_body(
        &self,
        page: &Page,
        request_id: &str,
    ) -> Result<Value, SessionError> {
        let cdp_id = self
            .cdp_request_id(request_id)
            .ok_or_else(|| SessionError::TabNotFound(format!("request {request_id}")))?;
        let body = page
            .execute(GetResponseBodyParams::new(cdp_id))
            .await
            .map_err(SessionError::from)?;
        Ok(serde_json::json!({
            "request_id": request_id,
            "body": body.result.body,
            "base64_encoded": body.result.base64_encoded,
        }))
    }
}

/// Attach console/error/network pumps to a page. Each pump runs until the
/// page's event stream closes.
pub async fn attach_observability(
    page: &Page,
    observability: Arc<SessionObservability>,
) -> Result<(), SessionError> {
    let mut console_events = page.event_listener::<EventConsoleApiCalled>().await?;
    let obs = Arc::clone(&observability);
    tokio::spawn(async move {
        while let Some(event) = console_events.next().await {
            let text = event
                .args
                .iter()
                .filter_map(|arg| arg.value.as_ref().map(|v| v.to_string()))
                .collect::<Vec<_>>()
                .join(" ");
            obs.console.lock().push(ConsoleEntry {
                ts: now_ms(),
                kind: format!("{:?}", event.r#type).to_lowercase(),
                text,
            });
        }
        debug!("console pump finished");
    });

    let mut exception_events = page.event_listener::<EventExceptionThrown>().await?;
    let obs = Arc::clone(&observability);
    tokio::spawn(async move {
        while let Some(event) = exception_events.next().await {
            let details = &event.exception_details;
            let text = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            obs.errors.lock().push(ConsoleEntry {
                ts: now_ms(),
                kind: "pageerror".to_string(),
                text,
            });
        }
        debug!("exception pump finished");
    });

    let mut request_events = page.event_listener::<EventRequestWillBeSent>().await?;
    let obs = Arc::clone(&observability);
    tokio::spawn(async move {
        while let Some(event) = request_events.next().await {
            let request_id = obs.next_request_id();
            obs.cdp_request_ids
                .lock()
                .insert(request_id.clone(), event.request_id.inner().clone());
            obs.requests.lock().push(RequestEntry {
                request_id,
                ts: now_ms(),
                stage: "request".to_string(),
                method: event.request.method.clone(),
                url: event.request.url.clone(),
                status: None,
                resource_type: event
                    .r#type
                    .as_ref()
                    .map(|t| format!("{t:?}").to_lowercase())
                    .unwrap_or_default(),
            });
        }
    });

    let mut response_events = page.event_listener::<EventResponseReceived>().await?;
    let obs = Arc::clone(&observability);
    tokio::spawn(async move {
        while let Some(event) = response_events.next().await {
            obs.requests.lock().push(RequestEntry {
                request_id: event.request_id.inner().clone(),
                ts: now_ms(),
                stage: "response".to_string(),
                method: String::new(),
                url: event.response.url.clone(),
                status: Some(event.response.status),
                resource_type: format!("{:?}", event.r#type).to_lowercase(),
            });
        }
    });

    let mut failure_events = page.event_listener::<EventLoadingFailed>().await?;
    let obs = Arc::clone(&observability);
    tokio::spawn(async move {
        while let Some(event) = failure_events.next().await {
            obs.errors.lock().push(ConsoleEntry {
                ts: now_ms(),
                kind: "requestfailed".to_string(),
                text: event.error_text.clone(),
            });
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest_beyond_cap() {
        let mut buf = RingBuffer::new(3);
        for i in 0..5 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.tail(10), vec![2, 3, 4]);
    }

    #[test]
    fn tail_returns_most_recent_entries_in_order() {
        let mut buf = RingBuffer::new(10);
        for i in 0..6 {
            buf.push(i);
        }
        assert_eq!(buf.tail(2), vec![4, 5]);
    }

    #[test]
    fn request_ids_are_monotonic() {
        let obs = SessionObservability::default();
        assert_eq!(obs.next_request_id(), "req_1");
        assert_eq!(obs.next_request_id(), "req_2");
    }
}
