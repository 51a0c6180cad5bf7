//! gaia — AI-driven browser test automation host.
//!
//! The library surface wires the workspace crates into the HTTP/WebSocket
//! service and the CLI: persistent sessions (`browser-session`), snapshot
//! construction (`snapshot-engine`), the effect-verifying executor
//! (`action-executor`) and the goal loop (`goal-agent`).

pub mod cli;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod server;

pub use config::AppConfig;
pub use errors::HostError;
