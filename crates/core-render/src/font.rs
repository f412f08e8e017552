//! Font metrics boundary.
//!
//! The renderer never measures glyphs itself. A GUI front-end supplies its
//! shaped font's metrics; headless code uses [`FixedMetrics`].

use core_text::{GlyphWidth, UnicodeGlyphWidth};

pub trait FontMetrics {
    /// Advance of one cell in pixels.
    fn cell_width(&self) -> f32;
    fn line_height(&self) -> f32;
    /// Baseline offset from the top of a line.
    fn ascent(&self) -> f32;
    /// True when the glyph for `text` needs two cells.
    fn is_wide_glyph(&self, text: &str) -> bool;
}

/// Metrics from configuration with Unicode-based width decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMetrics {
    pub cell_width: f32,
    pub line_height: f32,
    pub ascent: f32,
}

impl FixedMetrics {
    pub fn new(cell_width: f32, line_height: f32, ascent: f32) -> Self {
        Self {
            cell_width,
            line_height,
            ascent,
        }
    }

    /// The same font scaled by `factor` (minimap rendering).
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            cell_width: self.cell_width * factor,
            line_height: self.line_height * factor,
            ascent: self.ascent * factor,
        }
    }
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self::new(8.0, 16.0, 12.0)
    }
}

impl FontMetrics for FixedMetrics {
    fn cell_width(&self) -> f32 {
        self.cell_width
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn is_wide_glyph(&self, text: &str) -> bool {
        !UnicodeGlyphWidth.is_normal_width(text)
    }
}

/// Grid-facing width decision backed by font metrics.
pub struct MetricsWidth<'a>(pub &'a dyn FontMetrics);

impl GlyphWidth for MetricsWidth<'_> {
    #[inline]
    fn is_normal_width(&self, text: &str) -> bool {
        text.is_empty() || !self.0.is_wide_glyph(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_metrics() {
        let m = FixedMetrics::new(10.0, 20.0, 15.0).scaled(0.5);
        assert_eq!((m.cell_width, m.line_height, m.ascent), (5.0, 10.0, 7.5));
    }

    #[test]
    fn width_adapter_follows_metrics() {
        let m = FixedMetrics::default();
        let w = MetricsWidth(&m);
        assert!(w.is_normal_width("a"));
        assert!(!w.is_normal_width("漢"));
        assert!(w.is_normal_width(""));
    }
}
