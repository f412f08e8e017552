//! Paint timing.
//!
//! Duration of the last completed paint cycle in nanoseconds, process-wide so
//! the replay summary can read it without holding the compositor.
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_PAINT_NS: AtomicU64 = AtomicU64::new(0);

pub fn record_last_paint_ns(ns: u64) {
    LAST_PAINT_NS.store(ns, Ordering::Relaxed);
}

pub fn last_paint_ns() -> u64 {
    LAST_PAINT_NS.load(Ordering::Relaxed)
}
