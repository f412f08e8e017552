//! Window placement refresh with a bounded wait.
//!
//! The compositor needs every window's screen position to place grids and
//! draw borders. The query goes to the engine on a worker thread; the UI
//! thread waits at most `timeout`. On timeout the last-known placements stay
//! in effect and the outstanding call is kept, so its late answer is adopted
//! by the next `poll` or `refresh` instead of issuing a second query.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use core_engine::{EditorEngine, EngineError, PendingCall, WindowPlacement, spawn_call};
use core_grid::GridId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh placements adopted; `changed` is false when they equal the old ones.
    Updated { changed: bool },
    /// No answer in time; last-known placements reused.
    TimedOut,
    /// The engine failed; last-known placements reused.
    Failed,
}

#[derive(Debug)]
pub struct PlacementCache {
    known: AHashMap<GridId, WindowPlacement>,
    pending: Option<PendingCall<Vec<WindowPlacement>>>,
    timeout: Duration,
}

impl PlacementCache {
    pub fn new(timeout: Duration) -> Self {
        Self {
            known: AHashMap::new(),
            pending: None,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get(&self, grid: GridId) -> Option<&WindowPlacement> {
        self.known.get(&grid)
    }

    /// Known placements: normal windows first, floats last, each by grid id.
    pub fn ordered(&self) -> Vec<&WindowPlacement> {
        let mut all: Vec<&WindowPlacement> = self.known.values().collect();
        all.sort_by_key(|p| (p.floating, p.grid));
        all
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn remove(&mut self, grid: GridId) -> Option<WindowPlacement> {
        self.known.remove(&grid)
    }

    /// Adopt a late answer if one has arrived. Never blocks.
    pub fn poll(&mut self) -> Option<RefreshOutcome> {
        let result = self.pending.as_ref()?.try_take()?;
        self.pending = None;
        Some(self.settle(result))
    }

    /// Query the engine and wait at most the configured timeout.
    pub fn refresh(&mut self, engine: &Arc<dyn EditorEngine>) -> RefreshOutcome {
        let pending = self
            .pending
            .take()
            .unwrap_or_else(|| spawn_call(engine, "window_placements", |e| e.window_placements()));
        match pending.wait(self.timeout) {
            Err(err) if err.is_timeout() => {
                tracing::warn!(
                    target: "render.placement",
                    timeout_ms = self.timeout.as_millis() as u64,
                    known = self.known.len(),
                    "placement_timeout"
                );
                self.pending = Some(pending);
                RefreshOutcome::TimedOut
            }
            result => self.settle(result),
        }
    }

    fn settle(&mut self, result: Result<Vec<WindowPlacement>, EngineError>) -> RefreshOutcome {
        match result {
            Ok(list) => {
                let next: AHashMap<GridId, WindowPlacement> =
                    list.into_iter().map(|p| (p.grid, p)).collect();
                let changed = next != self.known;
                if changed {
                    tracing::debug!(target: "render.placement", windows = next.len(), "placements_changed");
                }
                self.known = next;
                RefreshOutcome::Updated { changed }
            }
            Err(err) => {
                tracing::warn!(target: "render.placement", error = %err, "placement_refresh_failed");
                RefreshOutcome::Failed
            }
        }
    }
}
