//! Screen compositor.
//!
//! Owns the primary grid set (multigrid on), the paint backend and everything
//! needed to turn accumulated damage into backend calls. One redraw batch is
//! applied as a unit: decode, dispatch every event, recompute the cursor, then
//! run exactly one paint cycle.
//!
//! Paint order per cycle: grid 1 (the whole-screen grid), normal window grids
//! by id, floating window grids by id, borders over the repainted pixels,
//! cursor overlay. A cycle with nothing to repaint and a cursor at rest makes
//! no backend calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use core_engine::{EditorEngine, PendingCall, spawn_call};
use core_grid::{Color, CursorShape, DEFAULT_GRID, Effect, GridId, GridSet, HighlightId, ModeInfo, PixelRect};
use core_protocol::{RawBatch, RedrawEvent, decode_batch};

use crate::backend::{CursorGlyph, PaintBackend, TextStyle};
use crate::border::{BorderStyle, draw_borders};
use crate::cursor::{AnimationGate, CursorCell, CursorMotion, CursorPos, ease_out_cubic};
use crate::font::{FontMetrics, MetricsWidth};
use crate::glyph_cache::GlyphCache;
use crate::paint_metrics::PaintMetrics;
use crate::painter::{GridPainter, PaintStats};
use crate::placement::{PlacementCache, RefreshOutcome};
use crate::timing;

#[derive(Debug, Clone, PartialEq)]
pub struct CompositorOptions {
    pub draw_borders: bool,
    pub border_fade_px: u8,
    /// Hard bound on the UI thread's wait for window placements.
    pub placement_timeout: Duration,
    pub glyph_cache_capacity: usize,
    pub cursor_animate: bool,
    pub cursor_duration: Duration,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            draw_borders: true,
            border_fade_px: 4,
            placement_timeout: Duration::from_millis(20),
            glyph_cache_capacity: 512,
            cursor_animate: true,
            cursor_duration: Duration::from_millis(80),
        }
    }
}

/// Outcome of one paint cycle that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleReport {
    pub grids: usize,
    pub stats: PaintStats,
    pub borders: usize,
    /// Union of the repainted grid regions in screen pixels.
    pub damage: Option<PixelRect>,
}

/// Cursor overlay as it should look right now.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorFrame {
    pub rect: PixelRect,
    pub color: Color,
    pub glyph: Option<CursorGlyph>,
    /// Glyph of the cell a moving cursor left, faded by the motion's progress.
    pub trail: Option<(PixelRect, CursorGlyph)>,
}

/// Alpha of the cursor drawn while the window is unfocused.
const UNFOCUSED_ALPHA: u8 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatchReport {
    pub events: usize,
    pub errors: usize,
    pub unknown: usize,
    pub cycle: Option<CycleReport>,
}

pub struct Compositor<B: PaintBackend> {
    set: GridSet,
    backend: B,
    font: Box<dyn FontMetrics>,
    glyphs: GlyphCache,
    placements: PlacementCache,
    engine: Arc<dyn EditorEngine>,
    options: CompositorOptions,
    /// Last `(cols, rows)` requested from the engine.
    requested: Option<(usize, usize)>,
    cursor: CursorMotion,
    gate: AnimationGate,
    focused: bool,
    cursor_dirty: bool,
    cursor_restyled: bool,
    /// Layout changed: every grid is repainted and its borders redrawn.
    border_dirty: bool,
    placements_stale: bool,
    resize_call: Option<PendingCall<()>>,
    resize_queued: Option<(usize, usize)>,
    metrics: Arc<PaintMetrics>,
}

impl<B: PaintBackend> Compositor<B> {
    pub fn new(
        backend: B,
        font: Box<dyn FontMetrics>,
        engine: Arc<dyn EditorEngine>,
        options: CompositorOptions,
    ) -> Self {
        Self {
            set: GridSet::new("primary", true),
            backend,
            glyphs: GlyphCache::new(options.glyph_cache_capacity),
            placements: PlacementCache::new(options.placement_timeout),
            gate: AnimationGate::new(options.cursor_animate),
            font,
            engine,
            options,
            requested: None,
            cursor: CursorMotion::default(),
            focused: true,
            cursor_dirty: false,
            cursor_restyled: false,
            border_dirty: false,
            placements_stale: false,
            resize_call: None,
            resize_queued: None,
            metrics: Arc::new(PaintMetrics::default()),
        }
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

    pub fn metrics(&self) -> Arc<PaintMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn cursor(&self) -> &CursorMotion {
        &self.cursor
    }

    pub fn placements(&self) -> &PlacementCache {
        &self.placements
    }

    pub fn glyph_cache(&self) -> &GlyphCache {
        &self.glyphs
    }

    /// Swap font metrics. Every rasterized glyph and every pixel is stale.
    pub fn set_font(&mut self, font: Box<dyn FontMetrics>) {
        self.font = font;
        self.glyphs.purge();
        self.set.queue_redraw_all();
        self.border_dirty = true;
        self.cursor_dirty = true;
    }

    // ---------------------------------------------------------------------------------------------
    // Event application
    // ---------------------------------------------------------------------------------------------

    /// Apply one decoded event to the primary grid set.
    pub fn dispatch(&mut self, event: &RedrawEvent) -> Effect {
        let widths = MetricsWidth(self.font.as_ref());
        let effect = self.set.apply(event, &widths);
        PaintMetrics::bump(&self.metrics.events_applied);
        match effect {
            Effect::Resized(_) => {
                self.placements_stale = true;
                self.border_dirty = true;
                self.cursor_dirty = true;
            }
            Effect::Destroyed(id) => {
                self.placements.remove(id);
                self.gate.forget(id);
                self.placements_stale = true;
                self.border_dirty = true;
                self.cursor_dirty = true;
            }
            Effect::Cursor(_) | Effect::Viewport(_) => self.cursor_dirty = true,
            Effect::DefaultColors => self.border_dirty = true,
            Effect::Mode => self.cursor_restyled = true,
            Effect::Content(_) | Effect::Highlights | Effect::Flush | Effect::None => {}
        }
        effect
    }

    /// Apply a whole batch and paint once.
    pub fn apply_batch(&mut self, batch: &RawBatch) -> BatchReport {
        let decoded = decode_batch(batch);
        PaintMetrics::bump(&self.metrics.batches);
        PaintMetrics::add(&self.metrics.decode_errors, decoded.errors as u64);
        PaintMetrics::add(&self.metrics.unknown_events, decoded.unknown as u64);
        for event in &decoded.events {
            self.dispatch(event);
        }
        let cycle = self.paint_cycle();
        tracing::debug!(
            target: "render.compositor",
            events = decoded.events.len(),
            errors = decoded.errors,
            unknown = decoded.unknown,
            painted = cycle.is_some(),
            "batch_applied"
        );
        BatchReport {
            events: decoded.events.len(),
            errors: decoded.errors,
            unknown: decoded.unknown,
            cycle,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Painting
    // ---------------------------------------------------------------------------------------------

    fn grid_origin(&self, id: GridId) -> Option<(f32, f32)> {
        if id == DEFAULT_GRID {
            return Some((0.0, 0.0));
        }
        let p = self.placements.get(id)?;
        Some((
            p.col as f32 * self.font.cell_width(),
            p.row as f32 * self.font.line_height(),
        ))
    }

    /// 0 for the screen grid, 1 for windows, 2 for floats.
    fn layer(&self, id: GridId) -> u8 {
        if id == DEFAULT_GRID {
            0
        } else if self.placements.get(id).is_some_and(|p| p.floating) {
            2
        } else {
            1
        }
    }

    fn screen_dims(&self) -> (usize, usize) {
        match self.set.grid(DEFAULT_GRID) {
            Some(g) if !g.is_empty() => (g.cols(), g.rows()),
            _ => self.requested.unwrap_or((0, 0)),
        }
    }

    fn refresh_placements(&mut self) {
        if let Some(outcome) = self.placements.poll() {
            self.adopt(outcome);
        }
        if !self.placements_stale {
            return;
        }
        let needs_engine = self.options.draw_borders || self.set.grids().any(|g| g.id() != DEFAULT_GRID);
        if !needs_engine {
            self.placements_stale = false;
            return;
        }
        PaintMetrics::bump(&self.metrics.placement_refreshes);
        let outcome = self.placements.refresh(&self.engine);
        if outcome == RefreshOutcome::TimedOut {
            PaintMetrics::bump(&self.metrics.placement_timeouts);
        }
        self.adopt(outcome);
    }

    fn adopt(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Updated { changed } => {
                self.placements_stale = false;
                if changed {
                    // Windows moved: every grid lands somewhere new.
                    self.set.queue_redraw_all();
                    self.border_dirty = true;
                    self.cursor_dirty = true;
                }
            }
            RefreshOutcome::Failed => self.placements_stale = false,
            RefreshOutcome::TimedOut => {}
        }
    }

    /// Paint all pending damage. `None` when no grid region needed
    /// repainting; the backend then sees at most a cursor overlay update, and
    /// nothing at all when the cursor neither moved nor changed style.
    pub fn paint_cycle(&mut self) -> Option<CycleReport> {
        let started = Instant::now();
        self.poll_resize();
        self.refresh_placements();
        let restyled = std::mem::take(&mut self.cursor_restyled);
        let cursor_changed = (self.cursor_dirty && self.recompute_cursor()) || restyled;
        if std::mem::take(&mut self.border_dirty) {
            self.set.queue_redraw_all();
        }
        if !self.set.has_damage() {
            PaintMetrics::bump(&self.metrics.skipped_cycles);
            tracing::trace!(target: "render.compositor", cursor_changed, "paint_skipped");
            if cursor_changed {
                self.paint_cursor();
            }
            return None;
        }

        let mut damage = self.set.take_damage();
        damage.sort_by_key(|(id, _)| (self.layer(*id), *id));

        let mut report = CycleReport::default();
        let mut painted = Vec::with_capacity(damage.len());
        {
            let painter = GridPainter::new(self.font.as_ref(), self.set.highlights(), self.set.defaults());
            for (id, region) in &damage {
                let Some(grid) = self.set.grid(*id) else { continue };
                let Some(origin) = self.grid_origin(*id) else {
                    tracing::trace!(target: "render.compositor", grid = *id, "grid_unplaced");
                    continue;
                };
                let stats = painter.paint(&mut self.backend, &mut self.glyphs, grid, *region, origin);
                let screen = painter.region_pixels(*region, origin);
                self.backend.present(screen);
                report.stats.merge(stats);
                report.grids += 1;
                painted.push(screen);
                report.damage = Some(match report.damage {
                    Some(acc) => union_pixels(acc, screen),
                    None => screen,
                });
            }
        }

        if self.options.draw_borders && !painted.is_empty() {
            let (cols, rows) = self.screen_dims();
            let style = BorderStyle {
                cell_width: self.font.cell_width(),
                line_height: self.font.line_height(),
                fade_px: self.options.border_fade_px,
                default_bg: self.set.defaults().bg,
            };
            let placements: Vec<_> = self.placements.ordered().into_iter().cloned().collect();
            report.borders = draw_borders(&mut self.backend, &placements, cols, rows, &style, &painted);
        }

        if report.grids > 0 || cursor_changed {
            self.paint_cursor();
        }

        let m = &self.metrics;
        PaintMetrics::bump(&m.paint_cycles);
        PaintMetrics::add(&m.grids_painted, report.grids as u64);
        PaintMetrics::add(&m.fill_calls, report.stats.fills + report.stats.decorations);
        PaintMetrics::add(&m.text_runs, report.stats.text_runs);
        PaintMetrics::add(&m.glyph_blits, report.stats.glyph_blits);
        PaintMetrics::add(&m.glyph_rasterized, report.stats.glyph_rasterized);
        PaintMetrics::add(&m.border_draws, report.borders as u64);
        let ns = started.elapsed().as_nanos() as u64;
        m.last_paint_ns.store(ns, std::sync::atomic::Ordering::Relaxed);
        timing::record_last_paint_ns(ns);
        tracing::trace!(
            target: "render.compositor",
            grids = report.grids,
            borders = report.borders,
            ns,
            "paint_cycle"
        );
        Some(report)
    }

    // ---------------------------------------------------------------------------------------------
    // Cursor
    // ---------------------------------------------------------------------------------------------

    fn cursor_target(&self) -> Option<(CursorPos, CursorCell)> {
        let grid_id = self.set.cursor_grid();
        let grid = self.set.grid(grid_id)?;
        if grid.is_empty() {
            return None;
        }
        let (row, col) = grid.cursor();
        let (ox, oy) = self.grid_origin(grid_id)?;
        let pos = CursorPos::new(
            ox + col as f32 * self.font.cell_width(),
            oy + row as f32 * self.font.line_height(),
        );
        Some((pos, CursorCell { grid: grid_id, row, col }))
    }

    /// Re-evaluate the cursor target against the current grid state.
    /// Returns true when the cursor state changed.
    pub fn recompute_cursor(&mut self) -> bool {
        self.cursor_dirty = false;
        let Some((target, cell)) = self.cursor_target() else {
            return false;
        };
        let animate = self.gate.allows(cell.grid);
        let before = self.cursor;
        self.cursor = before.retarget(target, cell, animate);
        if self.cursor.is_moving() && self.cursor.target() != before.target() {
            PaintMetrics::bump(&self.metrics.cursor_animations);
        }
        tracing::trace!(
            target: "render.cursor",
            grid = cell.grid,
            row = cell.row,
            col = cell.col,
            animate,
            "cursor_retarget"
        );
        self.cursor != before
    }

    /// `(cursor, text)` colors for a cursor over a cell of highlight `cell_hl`.
    /// A mode `attr_id` that is defined wins; otherwise the cell is inverted.
    fn cursor_colors(&self, cell_hl: HighlightId, mode: ModeInfo) -> (Color, Color) {
        let table = self.set.highlights();
        let defaults = self.set.defaults();
        match mode.attr_id.filter(|id| table.contains(*id)) {
            Some(id) => {
                let attr = table.get(id);
                (attr.bg(defaults), attr.fg(defaults))
            }
            None => {
                let hl = table.get(cell_hl);
                (hl.fg(defaults), hl.bg(defaults))
            }
        }
    }

    /// Overlay for the cursor as it should look now: shape from the current
    /// mode, glyphs read from the grid here and never remembered from the
    /// event that moved the cursor.
    pub fn cursor_frame(&self) -> Option<CursorFrame> {
        let cell = self.cursor.cell();
        let grid = self.set.grid(cell.grid)?;
        let c = grid.cell(cell.row, cell.col)?;
        let mode = self.set.cursor_mode();
        let (color, text_color) = self.cursor_colors(c.hl, mode);
        let cw = self.font.cell_width();
        let lh = self.font.line_height();
        let width = if c.is_wide() { 2.0 * cw } else { cw };
        let share = f32::from(mode.cell_percentage) / 100.0;
        let pos = self.cursor.position();
        let (rect, draws_text) = match mode.shape {
            CursorShape::Block => (PixelRect::new(pos.x, pos.y, width, lh), true),
            CursorShape::Horizontal => {
                let h = (lh * share).max(1.0);
                (PixelRect::new(pos.x, pos.y + lh - h, width, h), mode.cell_percentage >= 99)
            }
            CursorShape::Vertical => (PixelRect::new(pos.x, pos.y, (cw * share).max(1.0), lh), true),
        };
        if !self.focused {
            return Some(CursorFrame {
                rect,
                color: color.with_alpha(UNFOCUSED_ALPHA),
                glyph: None,
                trail: None,
            });
        }
        let glyph = (draws_text && !c.text.is_empty()).then(|| CursorGlyph {
            text: c.text.clone(),
            style: self.text_style(c.hl),
            color: text_color,
        });
        Some(CursorFrame {
            rect,
            color,
            glyph,
            trail: self.cursor_trail(mode),
        })
    }

    fn text_style(&self, hl: HighlightId) -> TextStyle {
        let hl = self.set.highlights().get(hl);
        TextStyle {
            bold: hl.is_bold(),
            italic: hl.is_italic(),
        }
    }

    /// Glyph under the cell the cursor is moving away from, as it looked
    /// under the cursor, fading out with the motion.
    fn cursor_trail(&self, mode: ModeInfo) -> Option<(PixelRect, CursorGlyph)> {
        if !self.cursor.is_moving() {
            return None;
        }
        let source = self.cursor.source()?;
        let grid = self.set.grid(source.grid)?;
        let c = grid.cell(source.row, source.col)?;
        if c.text.trim().is_empty() {
            return None;
        }
        let (ox, oy) = self.grid_origin(source.grid)?;
        let cw = self.font.cell_width();
        let lh = self.font.line_height();
        let width = if c.is_wide() { 2.0 * cw } else { cw };
        let rect = PixelRect::new(ox + source.col as f32 * cw, oy + source.row as f32 * lh, width, lh);
        let alpha = (255.0 * (1.0 - ease_out_cubic(self.cursor.progress()))).round() as u8;
        let (_, text_color) = self.cursor_colors(c.hl, mode);
        let glyph = CursorGlyph {
            text: c.text.clone(),
            style: self.text_style(c.hl),
            color: text_color.with_alpha(alpha),
        };
        Some((rect, glyph))
    }

    fn paint_cursor(&mut self) {
        let Some(frame) = self.cursor_frame() else {
            return;
        };
        self.backend.draw_cursor(frame.rect, frame.color, frame.glyph.as_ref());
        if let Some((rect, glyph)) = &frame.trail {
            self.backend.draw_cursor_trail(*rect, glyph);
        }
    }

    /// Advance the cursor animation. Returns true while it is still moving
    /// (the caller keeps ticking).
    pub fn tick(&mut self, dt: Duration) -> bool {
        if !self.cursor.is_moving() {
            return false;
        }
        self.cursor = self.cursor.tick(dt, self.options.cursor_duration);
        self.paint_cursor();
        self.cursor.is_moving()
    }

    pub fn set_key_repeat(&mut self, held: bool) {
        self.gate.set_key_repeat(held);
    }

    /// Record the scroll phase of a window; a window scroll moves the cursor.
    pub fn set_scroll_active(&mut self, grid: GridId, active: bool) {
        self.gate.set_scrolling(grid, active);
        if self.recompute_cursor() {
            self.paint_cursor();
        }
    }

    pub fn set_focus(&mut self, focused: bool) {
        if self.focused == focused {
            return;
        }
        self.focused = focused;
        self.recompute_cursor();
        self.paint_cursor();
    }

    // ---------------------------------------------------------------------------------------------
    // Sizing
    // ---------------------------------------------------------------------------------------------

    /// Cell dimensions that fit `width_px` x `height_px`.
    pub fn cells_for(&self, width_px: f32, height_px: f32) -> (usize, usize) {
        let cols = (width_px / self.font.cell_width()).floor().max(0.0) as usize;
        let rows = (height_px / self.font.line_height()).floor().max(0.0) as usize;
        (cols, rows)
    }

    /// Ask the engine to resize to the new window size. Returns false when
    /// nothing was requested: non-positive sizes, or the same cell dimensions
    /// as the last request.
    ///
    /// The request runs in the background; this never waits for the engine.
    /// While one request is in flight only the newest further size is kept
    /// and sent once the engine has answered, so requests arrive in order.
    pub fn update_size(&mut self, width_px: f32, height_px: f32) -> bool {
        if !(width_px > 0.0 && height_px > 0.0) {
            tracing::debug!(target: "render.compositor", width_px, height_px, "resize_ignored_non_positive");
            return false;
        }
        let (cols, rows) = self.cells_for(width_px, height_px);
        if cols == 0 || rows == 0 || self.requested == Some((cols, rows)) {
            return false;
        }
        self.requested = Some((cols, rows));
        PaintMetrics::bump(&self.metrics.resize_requests);
        tracing::info!(target: "render.compositor", cols, rows, "resize_request");
        if self.poll_resize() {
            self.resize_queued = Some((cols, rows));
        } else {
            self.send_resize(cols, rows);
        }
        true
    }

    fn send_resize(&mut self, cols: usize, rows: usize) {
        self.resize_call = Some(spawn_call(&self.engine, "try_resize", move |e| e.try_resize(cols, rows)));
    }

    /// Collect the answer to an outstanding resize request without waiting,
    /// then send the queued size if there is one. Returns true while a
    /// request is still outstanding.
    pub fn poll_resize(&mut self) -> bool {
        if let Some(call) = &self.resize_call {
            match call.try_take() {
                None => return true,
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    tracing::warn!(target: "render.compositor", error = %err, "resize_request_failed");
                }
            }
            self.resize_call = None;
        }
        match self.resize_queued.take() {
            Some((cols, rows)) => {
                self.send_resize(cols, rows);
                true
            }
            None => false,
        }
    }
}

fn union_pixels(a: PixelRect, b: PixelRect) -> PixelRect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    PixelRect::new(x, y, a.right().max(b.right()) - x, a.bottom().max(b.bottom()) - y)
}
