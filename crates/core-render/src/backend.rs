//! Paint backend abstraction.
//!
//! The compositor emits a short list of primitives per paint cycle; a GUI
//! front-end implements [`PaintBackend`] over its canvas. [`RecordingBackend`]
//! keeps the primitives as [`PaintCommand`]s instead, which is what the replay
//! binary and every paint test use.
//!
//! Invariants:
//! * Commands arrive in paint order: per damaged grid backgrounds, then text,
//!   then decorations, then `present`; borders last.
//! * Coordinates are absolute screen pixels.
//! * A paint cycle with no damage emits nothing at all.

use core_grid::{Color, PixelRect};

/// Font variant for a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
}

/// Handle to a glyph rasterized by the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphImage {
    pub id: u64,
    pub width: f32,
    pub height: f32,
}

/// Glyph drawn inside the cursor overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorGlyph {
    pub text: String,
    pub style: TextStyle,
    pub color: Color,
}

pub trait PaintBackend {
    fn fill_rect(&mut self, rect: PixelRect, color: Color);

    /// Draw `text` with its baseline at `(x, y)`, one cell advance per cluster.
    fn draw_text_run(&mut self, x: f32, y: f32, text: &str, style: TextStyle, color: Color);

    /// Rasterize a glyph into an image of `width` x `height` pixels.
    fn rasterize_glyph(
        &mut self,
        text: &str,
        style: TextStyle,
        color: Color,
        width: f32,
        height: f32,
    ) -> GlyphImage;

    /// Blit a previously rasterized glyph with its top-left at `(x, y)`.
    fn draw_cached_glyph(&mut self, x: f32, y: f32, image: &GlyphImage);

    /// The region `rect` is complete and may be shown.
    fn present(&mut self, _rect: PixelRect) {}

    /// Replace the cursor overlay; it lives above the grid surface.
    fn draw_cursor(&mut self, _rect: PixelRect, _color: Color, _glyph: Option<&CursorGlyph>) {}

    /// Add the glyph of the cell a moving cursor left to the overlay set by
    /// the last `draw_cursor`. `glyph.color` carries the fade alpha.
    fn draw_cursor_trail(&mut self, _rect: PixelRect, _glyph: &CursorGlyph) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    Fill {
        rect: PixelRect,
        color: Color,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        style: TextStyle,
        color: Color,
    },
    Rasterize {
        id: u64,
        text: String,
        style: TextStyle,
        color: Color,
    },
    Glyph {
        x: f32,
        y: f32,
        id: u64,
    },
    Present {
        rect: PixelRect,
    },
    Cursor {
        rect: PixelRect,
        color: Color,
        glyph: Option<CursorGlyph>,
    },
    CursorTrail {
        rect: PixelRect,
        glyph: CursorGlyph,
    },
}

/// Backend that records commands.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    cmds: Vec<PaintCommand>,
    next_glyph: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PaintCommand] {
        &self.cmds
    }

    /// Drain recorded commands.
    pub fn take(&mut self) -> Vec<PaintCommand> {
        std::mem::take(&mut self.cmds)
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Text of every `Text` command, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.cmds
            .iter()
            .filter_map(|c| match c {
                PaintCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(PixelRect, Color)> {
        self.cmds
            .iter()
            .filter_map(|c| match c {
                PaintCommand::Fill { rect, color } => Some((*rect, *color)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&PaintCommand) -> bool) -> usize {
        self.cmds.iter().filter(|c| pred(c)).count()
    }
}

impl PaintBackend for RecordingBackend {
    fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        self.cmds.push(PaintCommand::Fill { rect, color });
    }

    fn draw_text_run(&mut self, x: f32, y: f32, text: &str, style: TextStyle, color: Color) {
        if text.is_empty() {
            return;
        }
        self.cmds.push(PaintCommand::Text {
            x,
            y,
            text: text.to_string(),
            style,
            color,
        });
    }

    fn rasterize_glyph(
        &mut self,
        text: &str,
        style: TextStyle,
        color: Color,
        width: f32,
        height: f32,
    ) -> GlyphImage {
        self.next_glyph += 1;
        let id = self.next_glyph;
        self.cmds.push(PaintCommand::Rasterize {
            id,
            text: text.to_string(),
            style,
            color,
        });
        GlyphImage { id, width, height }
    }

    fn draw_cached_glyph(&mut self, x: f32, y: f32, image: &GlyphImage) {
        self.cmds.push(PaintCommand::Glyph { x, y, id: image.id });
    }

    fn present(&mut self, rect: PixelRect) {
        self.cmds.push(PaintCommand::Present { rect });
    }

    fn draw_cursor(&mut self, rect: PixelRect, color: Color, glyph: Option<&CursorGlyph>) {
        self.cmds.push(PaintCommand::Cursor {
            rect,
            color,
            glyph: glyph.cloned(),
        });
    }

    fn draw_cursor_trail(&mut self, rect: PixelRect, glyph: &CursorGlyph) {
        self.cmds.push(PaintCommand::CursorTrail {
            rect,
            glyph: glyph.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_drains() {
        let mut b = RecordingBackend::new();
        b.fill_rect(PixelRect::new(0.0, 0.0, 8.0, 16.0), Color::BLACK);
        b.draw_text_run(0.0, 12.0, "ab", TextStyle::default(), Color::WHITE);
        b.draw_text_run(0.0, 12.0, "", TextStyle::default(), Color::WHITE);
        let img = b.rasterize_glyph("漢", TextStyle::default(), Color::WHITE, 16.0, 16.0);
        b.draw_cached_glyph(8.0, 0.0, &img);
        assert_eq!(b.commands().len(), 4);
        assert_eq!(b.texts(), vec!["ab"]);
        assert_eq!(b.take().len(), 4);
        assert!(b.is_empty());
    }

    #[test]
    fn glyph_ids_are_unique() {
        let mut b = RecordingBackend::new();
        let a = b.rasterize_glyph("a", TextStyle::default(), Color::WHITE, 8.0, 16.0);
        let c = b.rasterize_glyph("a", TextStyle::default(), Color::WHITE, 8.0, 16.0);
        assert_ne!(a.id, c.id);
    }
}
