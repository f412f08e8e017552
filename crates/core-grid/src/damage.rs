//! Per-grid damage accumulation.
//!
//! Every mutation widens a single bounding rectangle; `flush` hands it out in
//! pixels and resets. One rectangle per grid (rather than a list) keeps the
//! paint path to one clip region per grid per batch.
//!
//! Invariants:
//! * Between flushes the rectangle only grows: it is always the exact bounding
//!   box of every queued rectangle.
//! * An empty tracker flushes to `None`; callers must not paint in that case.
//! * Queued rectangles are clipped to the grid extent; a rectangle entirely
//!   outside the grid is dropped.

/// Half-open cell rectangle: columns `x0..x1`, rows `y0..y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl CellRect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width),
            y1: y.saturating_add(height),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn union(self, other: CellRect) -> CellRect {
        CellRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn intersect(self, other: CellRect) -> Option<CellRect> {
        let r = CellRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (!r.is_empty()).then_some(r)
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.x0 && col < self.x1 && row >= self.y0 && row < self.y1
    }

    /// Pixel rectangle for this cell rectangle under the given metrics.
    pub fn to_pixels(&self, cell_width: f32, line_height: f32) -> PixelRect {
        PixelRect {
            x: self.x0 as f32 * cell_width,
            y: self.y0 as f32 * line_height,
            width: self.width() as f32 * cell_width,
            height: self.height() as f32 * line_height,
        }
    }
}

/// Rectangle in pixels, relative to the owning grid's origin unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Default, Clone)]
pub struct DamageTracker {
    rect: Option<CellRect>,
    cols: usize,
    rows: usize,
}

impl DamageTracker {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            rect: None,
            cols,
            rows,
        }
    }

    /// Change the grid extent used for clipping. Pending damage is clipped too.
    pub fn set_extent(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        self.rect = self.rect.and_then(|r| r.intersect(self.extent()));
    }

    fn extent(&self) -> CellRect {
        CellRect::new(0, 0, self.cols, self.rows)
    }

    /// Widen pending damage to include `width` x `height` cells at `(x, y)`.
    pub fn queue_redraw(&mut self, x: usize, y: usize, width: usize, height: usize) {
        let Some(clipped) = CellRect::new(x, y, width, height).intersect(self.extent()) else {
            return;
        };
        self.rect = Some(match self.rect {
            Some(r) => r.union(clipped),
            None => clipped,
        });
    }

    pub fn queue_redraw_all(&mut self) {
        let all = self.extent();
        self.rect = (!all.is_empty()).then_some(all);
    }

    pub fn is_empty(&self) -> bool {
        self.rect.is_none()
    }

    pub fn pending(&self) -> Option<CellRect> {
        self.rect
    }

    /// Take pending damage in cells, leaving the tracker empty.
    pub fn take(&mut self) -> Option<CellRect> {
        self.rect.take()
    }

    /// Take pending damage converted to pixels.
    pub fn flush(&mut self, cell_width: f32, line_height: f32) -> Option<PixelRect> {
        self.take().map(|r| r.to_pixels(cell_width, line_height))
    }

    pub fn clear(&mut self) {
        self.rect = None;
    }
}
