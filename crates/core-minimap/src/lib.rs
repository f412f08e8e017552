//! Minimap mirror.
//!
//! A second, headless editor engine shows the primary buffer at a small font
//! size. This crate keeps its own grid set (single grid; every grid-scoped
//! event lands on grid 1), paints it with the shared painter and overlays the
//! band marking the primary window's visible lines.
//!
//! The secondary engine is kept in sync by copying buffer lines over
//! (`SyncGate`), fire-and-forget. A slow or unreachable secondary only leaves
//! the minimap stale; nothing on the primary path waits for it.

mod indicator;
mod minimap;
mod sync;

pub use indicator::ViewportIndicator;
pub use minimap::{Minimap, MinimapOptions};
pub use sync::{SyncGate, SyncStart};
