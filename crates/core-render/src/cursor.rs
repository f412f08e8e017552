//! Cursor motion.
//!
//! `CursorMotion` is a value: `tick` and `retarget` return the next state and
//! never touch the grid. Only the cell coordinates are kept; the glyph under
//! the cursor is read from the grid when the cursor is painted.

use std::time::Duration;

use ahash::AHashSet;
use core_grid::GridId;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorPos {
    pub x: f32,
    pub y: f32,
}

impl CursorPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn lerp(self, to: CursorPos, t: f32) -> CursorPos {
        CursorPos {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Grid cell the cursor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorCell {
    pub grid: GridId,
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorPhase {
    #[default]
    Idle,
    Moving,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorMotion {
    start: CursorPos,
    target: CursorPos,
    progress: f32,
    phase: CursorPhase,
    cell: CursorCell,
    /// Cell the current animation left from.
    source: Option<CursorCell>,
}

/// Cubic ease-out on `[0, 1]`.
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

impl CursorMotion {
    /// Idle at `pos`.
    pub fn at(pos: CursorPos, cell: CursorCell) -> Self {
        Self {
            start: pos,
            target: pos,
            progress: 1.0,
            phase: CursorPhase::Idle,
            cell,
            source: None,
        }
    }

    pub fn phase(&self) -> CursorPhase {
        self.phase
    }

    pub fn is_moving(&self) -> bool {
        self.phase == CursorPhase::Moving
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn target(&self) -> CursorPos {
        self.target
    }

    pub fn cell(&self) -> CursorCell {
        self.cell
    }

    pub fn source(&self) -> Option<CursorCell> {
        self.source
    }

    /// Current on-screen position.
    pub fn position(&self) -> CursorPos {
        match self.phase {
            CursorPhase::Idle => self.target,
            CursorPhase::Moving => self.start.lerp(self.target, ease_out_cubic(self.progress)),
        }
    }

    /// Advance by `dt` of an animation lasting `duration`.
    pub fn tick(&self, dt: Duration, duration: Duration) -> Self {
        if self.phase == CursorPhase::Idle {
            return *self;
        }
        let step = if duration.is_zero() {
            1.0
        } else {
            dt.as_secs_f32() / duration.as_secs_f32()
        };
        let progress = self.progress + step;
        if progress >= 1.0 {
            return Self {
                start: self.target,
                progress: 1.0,
                phase: CursorPhase::Idle,
                source: None,
                ..*self
            };
        }
        Self { progress, ..*self }
    }

    /// Head for `target`. With `animate` the motion starts from wherever the
    /// cursor is drawn right now (possibly mid-flight); without it the cursor
    /// jumps.
    pub fn retarget(&self, target: CursorPos, cell: CursorCell, animate: bool) -> Self {
        if target == self.target {
            return Self { cell, ..*self };
        }
        let from = self.position();
        if !animate || from == target {
            return Self::at(target, cell);
        }
        Self {
            start: from,
            target,
            progress: 0.0,
            phase: CursorPhase::Moving,
            cell,
            source: Some(self.cell),
        }
    }
}

/// Conditions under which cursor moves jump instead of animating.
#[derive(Debug, Clone, Default)]
pub struct AnimationGate {
    enabled: bool,
    key_repeat: bool,
    scrolling: AHashSet<GridId>,
}

impl AnimationGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn set_key_repeat(&mut self, held: bool) {
        self.key_repeat = held;
    }

    /// Record whether bulk scrolling is in progress on `grid`.
    pub fn set_scrolling(&mut self, grid: GridId, active: bool) {
        if active {
            self.scrolling.insert(grid);
        } else {
            self.scrolling.remove(&grid);
        }
    }

    pub fn forget(&mut self, grid: GridId) {
        self.scrolling.remove(&grid);
    }

    pub fn allows(&self, grid: GridId) -> bool {
        self.enabled && !self.key_repeat && !self.scrolling.contains(&grid)
    }
}
