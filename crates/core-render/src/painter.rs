//! Paint one damaged region of one grid.
//!
//! Order within a region: background fills (one per same-background run),
//! text runs (one per contiguous same `(fg, bold, italic)` run), wide glyphs
//! through the glyph cache, then decorations. The region is widened by one
//! cell on either side when it would otherwise cut a wide pair in half.

use core_grid::{Cell, CellRect, Color, DefaultColors, GridBuffer, Highlight, HighlightTable, HlFlags, PixelRect};

use crate::backend::{PaintBackend, TextStyle};
use crate::font::FontMetrics;
use crate::glyph_cache::{GlyphCache, GlyphKey};

/// What one `paint` call emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaintStats {
    pub fills: u64,
    pub text_runs: u64,
    pub glyph_blits: u64,
    pub glyph_rasterized: u64,
    pub decorations: u64,
}

impl PaintStats {
    pub fn merge(&mut self, other: PaintStats) {
        self.fills += other.fills;
        self.text_runs += other.text_runs;
        self.glyph_blits += other.glyph_blits;
        self.glyph_rasterized += other.glyph_rasterized;
        self.decorations += other.decorations;
    }
}

/// Read-only paint inputs shared by every grid of a grid set.
pub struct GridPainter<'a> {
    pub metrics: &'a dyn FontMetrics,
    pub highlights: &'a HighlightTable,
    pub defaults: &'a DefaultColors,
}

struct TextRun {
    col: usize,
    text: String,
    fg: Color,
    style: TextStyle,
}

impl<'a> GridPainter<'a> {
    pub fn new(
        metrics: &'a dyn FontMetrics,
        highlights: &'a HighlightTable,
        defaults: &'a DefaultColors,
    ) -> Self {
        Self {
            metrics,
            highlights,
            defaults,
        }
    }

    /// Pixel rect of `region` with the grid placed at `origin`.
    pub fn region_pixels(&self, region: CellRect, origin: (f32, f32)) -> PixelRect {
        region
            .to_pixels(self.metrics.cell_width(), self.metrics.line_height())
            .translate(origin.0, origin.1)
    }

    /// Paint `region` of `grid` with the grid's top-left at `origin`.
    pub fn paint<B: PaintBackend + ?Sized>(
        &self,
        backend: &mut B,
        cache: &mut GlyphCache,
        grid: &GridBuffer,
        region: CellRect,
        origin: (f32, f32),
    ) -> PaintStats {
        let mut stats = PaintStats::default();
        let bottom = region.y1.min(grid.rows());
        for row in region.y0..bottom {
            let y = origin.1 + row as f32 * self.metrics.line_height();
            let Some(cells) = grid.row_cells(row) else {
                self.paint_blank(backend, region.x0, region.x1.min(grid.cols()), origin.0, y, &mut stats);
                continue;
            };
            let (x0, x1) = widen_span(cells, region.x0, region.x1.min(cells.len()));
            if x0 >= x1 {
                continue;
            }
            self.paint_backgrounds(backend, cells, x0, x1, origin.0, y, &mut stats);
            self.paint_text(backend, cache, cells, x0, x1, origin.0, y, &mut stats);
            self.paint_decorations(backend, cells, x0, x1, origin.0, y, &mut stats);
        }
        tracing::trace!(
            target: "render.paint",
            grid = grid.id(),
            x = region.x0,
            y = region.y0,
            w = region.width(),
            h = region.height(),
            fills = stats.fills,
            runs = stats.text_runs,
            "region_painted"
        );
        stats
    }

    fn hl(&self, id: u32) -> &Highlight {
        self.highlights.get(id)
    }

    /// Unallocated rows are blank cells of highlight 0.
    fn paint_blank<B: PaintBackend + ?Sized>(
        &self,
        backend: &mut B,
        x0: usize,
        x1: usize,
        ox: f32,
        y: f32,
        stats: &mut PaintStats,
    ) {
        if x0 >= x1 {
            return;
        }
        let cw = self.metrics.cell_width();
        let rect = PixelRect::new(ox + x0 as f32 * cw, y, (x1 - x0) as f32 * cw, self.metrics.line_height());
        backend.fill_rect(rect, self.hl(0).bg(self.defaults));
        stats.fills += 1;
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_backgrounds<B: PaintBackend + ?Sized>(
        &self,
        backend: &mut B,
        cells: &[Cell],
        x0: usize,
        x1: usize,
        ox: f32,
        y: f32,
        stats: &mut PaintStats,
    ) {
        let cw = self.metrics.cell_width();
        let lh = self.metrics.line_height();
        let mut start = x0;
        let mut bg = self.hl(cells[x0].hl).bg(self.defaults);
        for col in x0 + 1..=x1 {
            let next = (col < x1).then(|| self.hl(cells[col].hl).bg(self.defaults));
            if next == Some(bg) {
                continue;
            }
            let rect = PixelRect::new(ox + start as f32 * cw, y, (col - start) as f32 * cw, lh);
            backend.fill_rect(rect, bg);
            stats.fills += 1;
            if let Some(c) = next {
                start = col;
                bg = c;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_text<B: PaintBackend + ?Sized>(
        &self,
        backend: &mut B,
        cache: &mut GlyphCache,
        cells: &[Cell],
        x0: usize,
        x1: usize,
        ox: f32,
        y: f32,
        stats: &mut PaintStats,
    ) {
        let cw = self.metrics.cell_width();
        let lh = self.metrics.line_height();
        let baseline = y + self.metrics.ascent();
        let mut run: Option<TextRun> = None;

        for (col, cell) in cells.iter().enumerate().take(x1).skip(x0) {
            if cell.is_padding() {
                continue;
            }
            let hl = self.hl(cell.hl);
            let fg = hl.fg(self.defaults);
            let style = TextStyle {
                bold: hl.is_bold(),
                italic: hl.is_italic(),
            };

            if cell.is_wide() {
                flush_run(backend, run.take(), ox, baseline, cw, stats);
                let img = cache.get_or_insert_with(GlyphKey::new(&cell.text, fg, style), || {
                    stats.glyph_rasterized += 1;
                    backend.rasterize_glyph(&cell.text, style, fg, 2.0 * cw, lh)
                });
                backend.draw_cached_glyph(ox + col as f32 * cw, y, &img);
                stats.glyph_blits += 1;
                continue;
            }

            let text = if cell.text.is_empty() { " " } else { cell.text.as_str() };
            if text == " " {
                // Spaces extend a run but never start one.
                if let Some(r) = run.as_mut() {
                    r.text.push(' ');
                }
                continue;
            }
            match run.as_mut() {
                Some(r) if r.fg == fg && r.style == style => r.text.push_str(text),
                _ => {
                    flush_run(backend, run.take(), ox, baseline, cw, stats);
                    run = Some(TextRun {
                        col,
                        text: text.to_string(),
                        fg,
                        style,
                    });
                }
            }
        }
        flush_run(backend, run, ox, baseline, cw, stats);
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_decorations<B: PaintBackend + ?Sized>(
        &self,
        backend: &mut B,
        cells: &[Cell],
        x0: usize,
        x1: usize,
        ox: f32,
        y: f32,
        stats: &mut PaintStats,
    ) {
        let cw = self.metrics.cell_width();
        let lh = self.metrics.line_height();
        let ascent = self.metrics.ascent();
        let mask = HlFlags::UNDERLINE | HlFlags::UNDERCURL | HlFlags::STRIKETHROUGH;

        let mut col = x0;
        while col < x1 {
            let hl = self.hl(cells[col].hl);
            let deco = hl.flags & mask;
            if deco.is_empty() {
                col += 1;
                continue;
            }
            let color = hl.special(self.defaults);
            let start = col;
            while col < x1 {
                let h = self.hl(cells[col].hl);
                if h.flags & mask != deco || h.special(self.defaults) != color {
                    break;
                }
                col += 1;
            }
            let x = ox + start as f32 * cw;
            let w = (col - start) as f32 * cw;
            let under_y = (y + ascent + 1.0).min(y + lh - 1.0);
            if deco.contains(HlFlags::UNDERLINE) {
                backend.fill_rect(PixelRect::new(x, under_y, w, 1.0), color);
                stats.decorations += 1;
            }
            if deco.contains(HlFlags::UNDERCURL) {
                backend.fill_rect(PixelRect::new(x, under_y, w, 2.0), color);
                stats.decorations += 1;
            }
            if deco.contains(HlFlags::STRIKETHROUGH) {
                backend.fill_rect(PixelRect::new(x, y + (ascent * 0.65).round(), w, 1.0), color);
                stats.decorations += 1;
            }
        }
    }
}

fn flush_run<B: PaintBackend + ?Sized>(
    backend: &mut B,
    run: Option<TextRun>,
    ox: f32,
    baseline: f32,
    cw: f32,
    stats: &mut PaintStats,
) {
    let Some(run) = run else { return };
    let text = run.text.trim_end_matches(' ');
    if text.is_empty() {
        return;
    }
    backend.draw_text_run(ox + run.col as f32 * cw, baseline, text, run.style, run.fg);
    stats.text_runs += 1;
}

/// Widen `[x0, x1)` so it never starts on a padding cell or ends on a wide
/// leader.
fn widen_span(cells: &[Cell], mut x0: usize, mut x1: usize) -> (usize, usize) {
    if x0 > 0 && x0 < cells.len() && cells[x0].is_padding() {
        x0 -= 1;
    }
    if x1 > 0 && x1 < cells.len() && cells[x1 - 1].is_wide() {
        x1 += 1;
    }
    (x0, x1)
}
