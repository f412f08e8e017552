//! Damage-driven painting of a grid set onto a pixel backend.
//!
//! The compositor turns the damage a redraw batch left behind into a short
//! list of backend primitives. Nothing is repainted that was not damaged,
//! except the cursor overlay; a layout change damages every grid.
//!
//! Invariants:
//! - One paint cycle per applied batch, after the batch's last event.
//! - A cycle with no damage, no border work and a resting cursor issues zero
//!   backend calls (not even `present`).
//! - A wide glyph is painted once, from the left cell of its pair, as a single
//!   cached image two cells wide. A damaged region never splits a pair.
//! - `reverse` is resolved while painting; the highlight table keeps stored
//!   colors untouched.
//! - The UI thread's only blocking engine wait is the placement refresh and it
//!   is bounded by `placement_timeout`.
//!
//! Exposed Components:
//! - `backend`: the `PaintBackend` trait and `RecordingBackend`, which records
//!   `PaintCommand`s for the replay tool and for tests.
//! - `font`: `FontMetrics` (cell size, ascent, wide glyph decision) and
//!   `FixedMetrics` for headless use.
//! - `painter`: `GridPainter`, background / text run / wide glyph /
//!   decoration emission for one damaged region.
//! - `glyph_cache`: wide glyph images keyed by text, color and style.
//! - `border`: window separators with hairline and fade.
//! - `placement`: bounded window placement refresh with late-answer adoption.
//! - `cursor`: pure cursor motion state and the animation gate.
//! - `compositor`: the `Compositor` tying the above to a `GridSet`.
//! - `paint_metrics` / `timing`: counters and last-cycle duration.
//!
//! Paint Pipeline:
//! 1. `apply_batch` decodes the batch and dispatches every event to the grid set.
//! 2. `paint_cycle` collects a finished resize request, adopts any late
//!    placement answer, refreshes placements when a grid was resized or
//!    destroyed, and retargets the cursor if it moved or changed shape.
//! 3. Damage is drained per grid and painted in layer order (screen grid,
//!    windows, floats), each region followed by `present`. A layout change
//!    queues every grid first.
//! 4. Borders are drawn only over the pixels repainted this cycle, then the
//!    cursor overlay and, while it moves, the fading glyph at its source cell.
//!
//! Metrics Taxonomy (`PaintMetrics`):
//! - Volume: `batches`, `events_applied`, `paint_cycles`, `skipped_cycles`.
//! - Input quality: `decode_errors`, `unknown_events`.
//! - Backend work: `fill_calls`, `text_runs`, `glyph_blits`, `glyph_rasterized`,
//!   `border_draws`.
//! - Engine: `placement_refreshes`, `placement_timeouts`, `resize_requests`.
//! - Timing: `last_paint_ns` (point sample).

pub mod backend;
pub mod border;
pub mod compositor;
pub mod cursor;
pub mod font;
pub mod glyph_cache;
pub mod paint_metrics;
pub mod painter;
pub mod placement;
pub mod timing;

pub use backend::{CursorGlyph, GlyphImage, PaintBackend, PaintCommand, RecordingBackend, TextStyle};
pub use compositor::{BatchReport, Compositor, CompositorOptions, CycleReport};
pub use cursor::{AnimationGate, CursorCell, CursorMotion, CursorPhase, CursorPos};
pub use font::{FixedMetrics, FontMetrics, MetricsWidth};
pub use glyph_cache::{GlyphCache, GlyphKey};
pub use paint_metrics::{PaintMetrics, PaintMetricsSnapshot};
pub use painter::{GridPainter, PaintStats};
pub use placement::{PlacementCache, RefreshOutcome};
