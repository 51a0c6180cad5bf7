//! CDP screencast fan-out.
//!
//! One broadcaster is shared across all sessions. A slow or disconnected
//! subscriber loses frames; it never blocks the frame acknowledgement back
//! to the browser.

use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::page::{
    EventScreencastFrame, ScreencastFrameAckParams, StartScreencastFormat, StartScreencastParams,
    StopScreencastParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::errors::SessionError;

const FRAME_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreencastFrame {
    pub session_id: String,
    /// Base64 jpeg payload straight from CDP.
    pub frame: String,
    pub timestamp: f64,
}

/// Process-wide screencast hub: a broadcast channel plus the latest-frame
/// cache used to answer keyframe requests.
#[derive(Debug)]
pub struct ScreencastBroadcaster {
    tx: broadcast::Sender<ScreencastFrame>,
    current: Mutex<Option<ScreencastFrame>>,
}

impl Default for ScreencastBroadcaster {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            tx,
            current: Mutex::new(None),
        }
    }
}

impl ScreencastBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScreencastFrame> {
        self.tx.subscribe()
    }

    pub fn current_frame(&self) -> Option<ScreencastFrame> {
        self.current.lock().clone()
    }

    pub fn publish(&self, frame: ScreencastFrame) {
        *self.current.lock() = Some(frame.clone());
        // Send failure just means nobody is listening right now.
        let _ = self.tx.send(frame);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Start the CDP screencast on a page and pump frames into the broadcaster.
/// Every frame is acked regardless of subscriber state.
pub async fn start_screencast(
    page: &Page,
    session_id: String,
    broadcaster: Arc<ScreencastBroadcaster>,
) -> Result<(), SessionError> {
    let mut frames = page.event_listener::<EventScreencastFrame>().await?;
    page.execute(
        StartScreencastParams::builder()
            .format(StartScreencastFormat::Jpeg)
            .quality(80)
            .max_width(1280)
            .max_height(720)
            .every_nth_frame(3)
            .build(),
    )
    .await?;

    let ack_page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = frames.next().await {
            broadcaster.publish(ScreencastFrame {
                session_id: session_id.clone(),
                frame: event.data.clone().into(),
                timestamp: event.metadata.timestamp.as_ref().map(|t| *t.inner()).unwrap_or(0.0),
            });
            if let Err(err) = ack_page
                .execute(ScreencastFrameAckParams::new(event.session_id))
                .await
            {
                warn!(%err, "screencast frame ack failed");
            }
        }
        debug!("screencast pump finished");
    });

    Ok(())
}

pub async fn stop_screencast(page: &Page) -> Result<(), SessionError> {
    page.execute(StopScreencastParams::default()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_updates_current_frame_without_subscribers() {
        let hub = ScreencastBroadcaster::new();
        assert!(hub.current_frame().is_none());
        hub.publish(ScreencastFrame {
            session_id: "s1".into(),
            frame: "AAAA".into(),
            timestamp: 1.0,
        });
        let frame = hub.current_frame().unwrap();
        assert_eq!(frame.session_id, "s1");
    }

    #[tokio::test]
    async fn subscribers_receive_published_frames() {
        let hub = ScreencastBroadcaster::new();
        let mut rx = hub.subscribe();
        hub.publish(ScreencastFrame {
            session_id: "s1".into(),
            frame: "BBBB".into(),
            timestamp: 2.0,
        });
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.frame, "BBBB");
    }
}
