//! Goal-driven agent loop.
//!
//! Give the agent a goal, not steps: each iteration snapshots the page, asks
//! a vision-capable model for the single next action, executes it through
//! the browser host, and stops on the goal gate, stagnation or budget
//! exhaustion.

pub mod errors;
pub mod exploratory;
pub mod gateway;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod runner;
pub mod stagnation;
pub mod testdata;
pub mod view;

pub use errors::AgentError;
pub use exploratory::{CoverageReport, ExploratoryAgent, ExploratoryConfig, Issue, IssueSeverity};
pub use gateway::{BrowserGateway, GatewayAction, HttpBrowserGateway};
pub use parser::parse_decision;
pub use provider::{HttpVisionProvider, MockVisionProvider, VisionProvider};
pub use runner::{GoalRunner, GoalRunnerConfig};
pub use stagnation::{StagnationReason, StagnationTracker};
pub use view::{DomElementView, PageView};
