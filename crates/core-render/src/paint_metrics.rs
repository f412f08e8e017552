//! Paint path counters.
//!
//! Counts what the compositor actually did: batches applied, paint cycles run
//! or skipped, primitives handed to the backend, engine calls and their
//! outcomes. Atomics so a snapshot can be taken through a shared reference.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PaintMetrics {
    /// Redraw batches applied.
    pub batches: AtomicU64,
    /// Decoded events dispatched to a grid set.
    pub events_applied: AtomicU64,
    pub decode_errors: AtomicU64,
    pub unknown_events: AtomicU64,
    /// Paint cycles that reached the backend.
    pub paint_cycles: AtomicU64,
    /// Paint cycles with no damage (no backend calls).
    pub skipped_cycles: AtomicU64,
    /// Grids repainted, summed over cycles.
    pub grids_painted: AtomicU64,
    pub fill_calls: AtomicU64,
    pub text_runs: AtomicU64,
    pub glyph_blits: AtomicU64,
    /// Wide glyph cache misses that went to the rasterizer.
    pub glyph_rasterized: AtomicU64,
    pub border_draws: AtomicU64,
    pub placement_refreshes: AtomicU64,
    pub placement_timeouts: AtomicU64,
    pub resize_requests: AtomicU64,
    /// Cursor moves that started an animation rather than jumping.
    pub cursor_animations: AtomicU64,
    /// Duration (ns) of the most recent paint cycle.
    pub last_paint_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaintMetricsSnapshot {
    pub batches: u64,
    pub events_applied: u64,
    pub decode_errors: u64,
    pub unknown_events: u64,
    pub paint_cycles: u64,
    pub skipped_cycles: u64,
    pub grids_painted: u64,
    pub fill_calls: u64,
    pub text_runs: u64,
    pub glyph_blits: u64,
    pub glyph_rasterized: u64,
    pub border_draws: u64,
    pub placement_refreshes: u64,
    pub placement_timeouts: u64,
    pub resize_requests: u64,
    pub cursor_animations: u64,
    pub last_paint_ns: u64,
}

impl PaintMetrics {
    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PaintMetricsSnapshot {
        PaintMetricsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_events: self.unknown_events.load(Ordering::Relaxed),
            paint_cycles: self.paint_cycles.load(Ordering::Relaxed),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            grids_painted: self.grids_painted.load(Ordering::Relaxed),
            fill_calls: self.fill_calls.load(Ordering::Relaxed),
            text_runs: self.text_runs.load(Ordering::Relaxed),
            glyph_blits: self.glyph_blits.load(Ordering::Relaxed),
            glyph_rasterized: self.glyph_rasterized.load(Ordering::Relaxed),
            border_draws: self.border_draws.load(Ordering::Relaxed),
            placement_refreshes: self.placement_refreshes.load(Ordering::Relaxed),
            placement_timeouts: self.placement_timeouts.load(Ordering::Relaxed),
            resize_requests: self.resize_requests.load(Ordering::Relaxed),
            cursor_animations: self.cursor_animations.load(Ordering::Relaxed),
            last_paint_ns: self.last_paint_ns.load(Ordering::Relaxed),
        }
    }
}
