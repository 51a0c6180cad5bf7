//! Persistent browser sessions for the gaia host.
//!
//! A session owns one browser process and its pages. The registry hands out
//! per-session handles guarded by an async mutex so a session is always
//! single-writer: one action, snapshot or navigation at a time.

pub mod config;
pub mod errors;
pub mod launch;
pub mod nav;
pub mod observability;
pub mod registry;
pub mod screencast;
pub mod session;
pub mod state_ops;
pub mod tabs;
pub mod trace;

pub use config::BrowserSessionConfig;
pub use errors::SessionError;
pub use nav::{navigate_if_needed, normalize_url, wait_for_ready_state};
pub use observability::{ConsoleEntry, DialogEntry, DownloadEntry, RequestEntry, RingBuffer, SessionObservability};
pub use registry::{SessionHandle, SessionRegistry};
pub use screencast::{ScreencastBroadcaster, ScreencastFrame};
pub use session::{DialogMode, Session};
pub use tabs::{coerce_tab_index, match_target_prefix, PrefixMatch, TabPayload, TabResolution};
