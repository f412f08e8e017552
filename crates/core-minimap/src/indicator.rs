//! The translucent band marking the primary window's visible lines.

use core_grid::{PixelRect, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportIndicator {
    /// Top of the band in minimap pixels.
    pub y: f32,
    pub height: f32,
}

impl ViewportIndicator {
    /// Band for the primary viewport `primary` while the minimap shows lines
    /// from `minimap_top` on.
    ///
    /// An empty primary viewport (not reported yet) falls back to the primary
    /// window's row count. Lines above the minimap's first line are cut off.
    pub fn compute(primary: Viewport, minimap_top: i64, window_rows: usize, line_height: f32) -> Self {
        let mut lines = primary.bottom_line - primary.top_line;
        let mut offset = primary.top_line - minimap_top;
        if lines <= 0 {
            lines = i64::try_from(window_rows).unwrap_or(i64::MAX);
        }
        if offset < 0 {
            lines += offset;
            offset = 0;
        }
        let lines = lines.max(0);
        Self {
            y: (line_height * offset as f32).floor(),
            height: (line_height * lines as f32).floor(),
        }
    }

    pub fn rect(&self, width: f32) -> PixelRect {
        PixelRect::new(0.0, self.y, width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.height <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vp(top: i64, bottom: i64) -> Viewport {
        Viewport {
            top_line: top,
            bottom_line: bottom,
            ..Viewport::default()
        }
    }

    #[test]
    fn band_offset_from_minimap_top() {
        let ind = ViewportIndicator::compute(vp(40, 70), 10, 30, 2.0);
        assert_eq!(ind, ViewportIndicator { y: 60.0, height: 60.0 });
    }

    #[test]
    fn empty_viewport_uses_window_rows() {
        let ind = ViewportIndicator::compute(vp(5, 5), 0, 24, 2.0);
        assert_eq!(ind, ViewportIndicator { y: 10.0, height: 48.0 });
    }

    #[test]
    fn viewport_above_minimap_is_clipped() {
        let ind = ViewportIndicator::compute(vp(10, 30), 15, 20, 1.0);
        assert_eq!(ind, ViewportIndicator { y: 0.0, height: 15.0 });
        let gone = ViewportIndicator::compute(vp(0, 10), 50, 10, 1.0);
        assert!(gone.is_empty());
        assert_eq!(gone.height, 0.0);
    }
}
