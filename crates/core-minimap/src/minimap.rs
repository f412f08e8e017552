use std::sync::Arc;

use core_engine::EditorEngine;
use core_grid::{DEFAULT_GRID, Effect, GridSet, PixelRect, Viewport};
use core_protocol::{RawBatch, decode_batch};
use core_render::{FixedMetrics, FontMetrics, GlyphCache, GridPainter, MetricsWidth, PaintBackend};

use crate::indicator::ViewportIndicator;
use crate::sync::{SyncGate, SyncStart};

/// Indicator alpha over the default foreground.
const INDICATOR_ALPHA: u8 = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct MinimapOptions {
    pub enabled: bool,
    pub sync_timeout: std::time::Duration,
    pub glyph_cache_capacity: usize,
}

pub struct Minimap<B: PaintBackend> {
    set: GridSet,
    backend: B,
    font: FixedMetrics,
    glyphs: GlyphCache,
    engine: Arc<dyn EditorEngine>,
    sync: SyncGate,
    enabled: bool,
    primary: Option<(Viewport, usize)>,
    indicator: Option<ViewportIndicator>,
}

impl<B: PaintBackend> Minimap<B> {
    /// `font` is the primary font already scaled down for the minimap.
    pub fn new(backend: B, font: FixedMetrics, engine: Arc<dyn EditorEngine>, options: MinimapOptions) -> Self {
        Self {
            set: GridSet::new("minimap", false),
            backend,
            font,
            glyphs: GlyphCache::new(options.glyph_cache_capacity),
            engine,
            sync: SyncGate::new(options.sync_timeout),
            enabled: options.enabled,
            primary: None,
            indicator: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.set.queue_redraw_all();
        }
        self.enabled = enabled;
    }

    pub fn grids(&self) -> &GridSet {
        &self.set
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn indicator(&self) -> Option<ViewportIndicator> {
        self.indicator
    }

    pub fn sync_gate(&self) -> &SyncGate {
        &self.sync
    }

    fn width_px(&self) -> f32 {
        self.set
            .grid(DEFAULT_GRID)
            .map_or(0.0, |g| g.cols() as f32 * self.font.cell_width())
    }

    fn own_top_line(&self) -> i64 {
        self.set.viewport(DEFAULT_GRID).map_or(0, |v| v.top_line)
    }

    /// Damage the rows a band covers so the content under it is repainted.
    fn damage_band(&mut self, band: ViewportIndicator) {
        let lh = self.font.line_height();
        if lh <= 0.0 {
            return;
        }
        let Some(grid) = self.set.grid_mut(DEFAULT_GRID) else {
            return;
        };
        let first = (band.y / lh).floor().max(0.0) as usize;
        let last = ((band.y + band.height) / lh).ceil().max(0.0) as usize;
        let cols = grid.cols();
        grid.damage_mut().queue_redraw(0, first, cols, last.saturating_sub(first).max(1));
    }

    fn recompute_indicator(&mut self) {
        let Some((viewport, rows)) = self.primary else {
            return;
        };
        let next = ViewportIndicator::compute(viewport, self.own_top_line(), rows, self.font.line_height());
        if self.indicator == Some(next) {
            return;
        }
        if let Some(old) = self.indicator {
            self.damage_band(old);
        }
        self.damage_band(next);
        tracing::trace!(target: "minimap", y = next.y, height = next.height, "indicator_moved");
        self.indicator = Some(next);
    }

    /// The primary window scrolled or changed size.
    pub fn on_primary_viewport(&mut self, viewport: Viewport, window_rows: usize) {
        if self.primary == Some((viewport, window_rows)) {
            return;
        }
        self.primary = Some((viewport, window_rows));
        self.recompute_indicator();
    }

    /// Start a buffer sync from `primary` unless one is running.
    pub fn request_sync(&mut self, primary: &Arc<dyn EditorEngine>) -> SyncStart {
        if !self.enabled {
            return SyncStart::Busy;
        }
        self.sync.request(primary, &self.engine)
    }

    /// Apply a redraw batch from the minimap engine and paint once.
    pub fn apply_batch(&mut self, batch: &RawBatch) -> Option<PixelRect> {
        let decoded = decode_batch(batch);
        let effects = {
            let widths = MetricsWidth(&self.font);
            self.set.apply_all(&decoded.events, &widths)
        };
        if effects.iter().any(|e| matches!(e, Effect::Viewport(_) | Effect::Resized(_))) {
            self.recompute_indicator();
        }
        self.sync.poll();
        self.paint()
    }

    /// Paint pending damage plus the part of the indicator it covers.
    pub fn paint(&mut self) -> Option<PixelRect> {
        if !self.enabled || !self.set.has_damage() {
            return None;
        }
        let width = self.width_px();
        let damage = self.set.take_damage();
        let painter = GridPainter::new(&self.font, self.set.highlights(), self.set.defaults());
        let mut painted: Option<PixelRect> = None;
        for (id, region) in damage {
            let Some(grid) = self.set.grid(id) else { continue };
            painter.paint(&mut self.backend, &mut self.glyphs, grid, region, (0.0, 0.0));
            let rect = painter.region_pixels(region, (0.0, 0.0));
            painted = Some(match painted {
                Some(acc) => union(acc, rect),
                None => rect,
            });
        }
        let rect = painted?;
        if let Some(band) = self.indicator.filter(|b| !b.is_empty()) {
            if let Some(clip) = intersect(band.rect(width), rect) {
                let color = self.set.defaults().fg.with_alpha(INDICATOR_ALPHA);
                self.backend.fill_rect(clip, color);
            }
        }
        self.backend.present(rect);
        Some(rect)
    }
}

fn union(a: PixelRect, b: PixelRect) -> PixelRect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    PixelRect::new(x, y, a.right().max(b.right()) - x, a.bottom().max(b.bottom()) - y)
}

fn intersect(a: PixelRect, b: PixelRect) -> Option<PixelRect> {
    if !a.intersects(&b) {
        return None;
    }
    let x = a.x.max(b.x);
    let y = a.y.max(b.y);
    Some(PixelRect::new(x, y, a.right().min(b.right()) - x, a.bottom().min(b.bottom()) - y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_engine::MemoryEngine;
    use core_grid::Color;
    use core_render::RecordingBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn minimap() -> Minimap<RecordingBackend> {
        Minimap::new(
            RecordingBackend::new(),
            FixedMetrics::new(2.0, 2.0, 2.0),
            Arc::new(MemoryEngine::named("minimap")),
            MinimapOptions {
                enabled: true,
                sync_timeout: std::time::Duration::from_secs(1),
                glyph_cache_capacity: 64,
            },
        )
    }

    #[test]
    fn multigrid_events_land_on_one_grid() {
        let mut m = minimap();
        m.apply_batch(
            &RawBatch::from_value(json!([
                ["grid_resize", [4, 10, 20]],
                ["grid_line", [4, 0, 0, [["a", 0, 3]]]]
            ]))
            .unwrap(),
        );
        assert_eq!(m.grids().grid_ids(), vec![DEFAULT_GRID]);
        assert_eq!(m.grids().grid(1).unwrap().line_text(0), "aaa       ");
    }

    #[test]
    fn indicator_painted_only_inside_damage() {
        let mut m = minimap();
        m.apply_batch(&RawBatch::from_value(json!([["grid_resize", [1, 10, 20]]])).unwrap());
        m.on_primary_viewport(Viewport { top_line: 2, bottom_line: 6, ..Viewport::default() }, 4);
        m.backend_mut().clear();
        let painted = m.paint().unwrap();
        assert_eq!(painted, PixelRect::new(0.0, 4.0, 20.0, 8.0));
        let band = m.backend().fills().last().copied().unwrap();
        assert_eq!(band.0, PixelRect::new(0.0, 4.0, 20.0, 8.0));
        assert_eq!(band.1.a, INDICATOR_ALPHA);
    }

    #[test]
    fn disabled_minimap_paints_nothing() {
        let mut m = minimap();
        m.set_enabled(false);
        let r = m.apply_batch(&RawBatch::from_value(json!([["grid_resize", [1, 10, 20]]])).unwrap());
        assert_eq!(r, None);
        assert!(m.backend().is_empty());
        m.set_enabled(true);
        assert!(m.paint().is_some());
    }

    #[test]
    fn cleared_rows_are_blanked() {
        let mut m = minimap();
        m.apply_batch(
            &RawBatch::from_value(json!([
                ["grid_resize", [1, 10, 3]],
                ["grid_line", [1, 1, 0, [["x", 0, 10]]]]
            ]))
            .unwrap(),
        );
        m.backend_mut().clear();
        let painted = m.apply_batch(&RawBatch::from_value(json!([["grid_clear", [1]]])).unwrap());
        assert_eq!(painted, Some(PixelRect::new(0.0, 0.0, 20.0, 6.0)));
        let rows: Vec<_> = (0..3)
            .map(|r| (PixelRect::new(0.0, r as f32 * 2.0, 20.0, 2.0), Color::BLACK))
            .collect();
        assert_eq!(m.backend().fills(), rows);
        assert!(m.backend().texts().is_empty());
    }
}
