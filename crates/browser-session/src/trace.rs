//! Trace capture over the CDP Tracing domain.
//!
//! Collected event chunks are buffered in memory and written to a JSON file
//! under the data root when the trace stops.

use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::tracing::{
    EndParams, EventDataCollected, EventTracingComplete, StartParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::SessionError;

pub struct TraceRecorder {
    page: Page,
    path: PathBuf,
    events: Arc<Mutex<Vec<Value>>>,
    collector: JoinHandle<()>,
    complete: Arc<tokio::sync::Notify>,
}

impl TraceRecorder {
    /// Start tracing on a page. The recorder owns the collector task until
    /// `stop` or `abandon`.
    pub async fn start(page: Page, path: PathBuf) -> Result<Self, SessionError> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let complete = Arc::new(tokio::sync::Notify::new());

        let mut chunks = page.event_listener::<EventDataCollected>().await?;
        let mut completions = page.event_listener::<EventTracingComplete>().await?;
        let sink = Arc::clone(&events);
        let notify = Arc::clone(&complete);
        let collector = tokio::spawn(async move {
            loop {
                tokio::select! {
                    chunk = chunks.next() => {
                        match chunk {
                            Some(chunk) => sink.lock().extend(chunk.value.iter().cloned()),
                            None => break,
                        }
                    }
                    done = completions.next() => {
                        if done.is_some() {
                            notify.notify_waiters();
                        }
                        break;
                    }
                }
            }
            debug!("trace collector finished");
        });

        page.execute(StartParams::default()).await?;

        Ok(Self {
            page,
            path,
            events,
            collector,
            complete,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Stop tracing, wait briefly for the completion event and write the
    /// collected events to disk.
    pub async fn stop(self) -> Result<PathBuf, SessionError> {
        self.page.execute(EndParams::default()).await?;
        let _ = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            self.complete.notified(),
        )
        .await;
        self.collector.abort();

        let events = self.events.lock().clone();
        let body = serde_json::json!({ "traceEvents": events });
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&body).unwrap_or_default())
            .await?;
        Ok(self.path)
    }

    /// Drop the trace without writing anything.
    pub async fn abandon(self) -> Result<(), SessionError> {
        let _ = self.page.execute(EndParams::default()).await;
        self.collector.abort();
        Ok(())
    }
}
