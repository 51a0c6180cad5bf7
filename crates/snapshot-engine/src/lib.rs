//! Snapshot construction for the gaia host.
//!
//! A snapshot enumerates interactive and semantic elements across the main
//! document, same-origin iframes and open shadow roots, stamps each element
//! with a stable dom-ref attribute, and assigns snapshot-scoped ref ids.
//! Rendering to text formats never alters the underlying ref map.

pub mod capture;
pub mod dedupe;
pub mod errors;
pub mod hash;
pub mod render;
pub mod script;

pub use capture::{capture_snapshot, CaptureOptions};
pub use dedupe::{cap_elements, dedupe_by_dom_ref, signal_score, RawElement};
pub use errors::SnapshotError;
pub use hash::{compute_dom_hash, runtime_hash_from_signature};
pub use render::{render_snapshot, RenderOptions, RenderedSnapshot};
