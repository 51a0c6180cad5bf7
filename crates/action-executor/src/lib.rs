//! Effect-verifying action execution.
//!
//! The executor resolves `(snapshot_id, ref_id)` to a live element, performs
//! exactly one action, and decides from before/after evidence whether the
//! action was *effective* (caused a meaningful state change) rather than
//! merely transported. It owns stale-ref recovery, scope checks, retries,
//! probe schedules and the closed failure taxonomy.

pub mod dispatch;
pub mod errors;
pub mod evidence;
pub mod executor;
pub mod flags;
pub mod locate;
pub mod reveal;
pub mod stale;

pub use errors::ExecError;
pub use executor::{execute_ref_action, ExecutorConfig};
pub use flags::compute_state_change;
pub use stale::{initial_ref_state, rescue_stale_ref, RefState, RESCUE_ACCEPT_SCORE};
