//! Shared data model for the gaia browser automation host.
//!
//! Everything that crosses a crate boundary lives here: identifiers,
//! the closed reason-code set, snapshot/element descriptors, action
//! requests and results, and the goal-loop models.

pub mod action;
pub mod goal;
pub mod ids;
pub mod reason;
pub mod result;
pub mod snapshot;

pub use action::*;
pub use goal::*;
pub use ids::*;
pub use reason::*;
pub use result::*;
pub use snapshot::*;
