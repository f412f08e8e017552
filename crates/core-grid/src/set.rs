//! Event dispatch over a set of grids sharing one highlight table.
//!
//! A `GridSet` is the whole mutable state a redraw stream acts on: the grids
//! keyed by id, the highlight table, the default colors and the last reported
//! viewport per grid. The compositor owns one (multigrid on) and the minimap
//! owns another (multigrid off: every grid-scoped event lands on grid 1).

use std::collections::BTreeMap;

use ahash::AHashMap;
use core_protocol::{CellRun, DEFAULT_GRID, GridId, ModeInfo, RedrawEvent};
use core_text::GlyphWidth;

use crate::{
    CellRect, CellWrite, Color, DefaultColors, GridBuffer, HighlightId, HighlightTable,
};

/// Visible buffer lines of a window grid as last reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// First visible buffer line, 0-based.
    pub top_line: i64,
    /// One past the last visible buffer line.
    pub bottom_line: i64,
    pub cursor_line: i64,
    pub cursor_col: i64,
}

/// What a dispatched event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Content(GridId),
    /// The grid cursor moved; content may have changed as well.
    Cursor(GridId),
    Resized(GridId),
    Destroyed(GridId),
    Viewport(GridId),
    Highlights,
    DefaultColors,
    /// Cursor style table or current mode changed.
    Mode,
    Flush,
}

#[derive(Debug)]
pub struct GridSet {
    grids: BTreeMap<GridId, GridBuffer>,
    highlights: HighlightTable,
    defaults: DefaultColors,
    viewports: AHashMap<GridId, Viewport>,
    cursor_grid: GridId,
    modes: Vec<ModeInfo>,
    cursor_style_enabled: bool,
    mode_index: usize,
    mode: String,
    multigrid: bool,
    name: &'static str,
}

impl GridSet {
    /// `name` only labels log records (`"primary"`, `"minimap"`).
    pub fn new(name: &'static str, multigrid: bool) -> Self {
        Self {
            grids: BTreeMap::new(),
            highlights: HighlightTable::new(),
            defaults: DefaultColors::default(),
            viewports: AHashMap::new(),
            cursor_grid: DEFAULT_GRID,
            modes: Vec::new(),
            cursor_style_enabled: false,
            mode_index: 0,
            mode: String::new(),
            multigrid,
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_multigrid(&self) -> bool {
        self.multigrid
    }

    pub fn grid(&self, id: GridId) -> Option<&GridBuffer> {
        self.grids.get(&self.route(id))
    }

    pub fn grid_mut(&mut self, id: GridId) -> Option<&mut GridBuffer> {
        let id = self.route(id);
        self.grids.get_mut(&id)
    }

    /// Grids in ascending id order.
    pub fn grids(&self) -> impl Iterator<Item = &GridBuffer> {
        self.grids.values()
    }

    pub fn grid_ids(&self) -> Vec<GridId> {
        self.grids.keys().copied().collect()
    }

    pub fn highlights(&self) -> &HighlightTable {
        &self.highlights
    }

    pub fn defaults(&self) -> &DefaultColors {
        &self.defaults
    }

    pub fn viewport(&self, id: GridId) -> Option<Viewport> {
        self.viewports.get(&self.route(id)).copied()
    }

    /// Grid that received the last cursor goto.
    pub fn cursor_grid(&self) -> GridId {
        self.cursor_grid
    }

    /// Cursor style of the current mode. Block when the engine did not enable
    /// cursor styling or the mode index is unknown.
    pub fn cursor_mode(&self) -> ModeInfo {
        if !self.cursor_style_enabled {
            return ModeInfo::default();
        }
        self.modes.get(self.mode_index).copied().unwrap_or_default()
    }

    /// Name of the current mode (`"normal"`, `"insert"`, ...); empty before
    /// the first `mode_change`.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Effective `(fg, bg)` of a highlight id.
    pub fn resolve(&self, hl: HighlightId) -> (Color, Color) {
        let h = self.highlights.get(hl);
        (h.fg(&self.defaults), h.bg(&self.defaults))
    }

    pub fn has_damage(&self) -> bool {
        self.grids.values().any(|g| !g.damage().is_empty())
    }

    /// Drain pending damage of every grid, ascending by id.
    pub fn take_damage(&mut self) -> Vec<(GridId, CellRect)> {
        self.grids
            .iter_mut()
            .filter_map(|(id, g)| g.damage_mut().take().map(|r| (*id, r)))
            .collect()
    }

    pub fn queue_redraw_all(&mut self) {
        for g in self.grids.values_mut() {
            g.damage_mut().queue_redraw_all();
        }
    }

    #[inline]
    fn route(&self, id: GridId) -> GridId {
        if self.multigrid { id } else { DEFAULT_GRID }
    }

    fn grid_entry(&mut self, id: GridId) -> &mut GridBuffer {
        let id = self.route(id);
        let name = self.name;
        self.grids.entry(id).or_insert_with(|| {
            tracing::debug!(target: "grid.dispatch", set = name, grid = id, "grid_created_lazily");
            GridBuffer::new(id)
        })
    }

    /// Apply every event in order.
    pub fn apply_all(&mut self, events: &[RedrawEvent], widths: &dyn GlyphWidth) -> Vec<Effect> {
        events.iter().map(|ev| self.apply(ev, widths)).collect()
    }

    /// Apply one event.
    pub fn apply(&mut self, event: &RedrawEvent, widths: &dyn GlyphWidth) -> Effect {
        match event {
            RedrawEvent::Resize { grid, cols, rows } => {
                let id = self.route(*grid);
                match self.grids.get_mut(&id) {
                    Some(g) => g.resize(*rows, *cols),
                    None => {
                        self.grids.insert(id, GridBuffer::with_size(id, *rows, *cols));
                    }
                }
                Effect::Resized(id)
            }
            RedrawEvent::Clear { grid } => {
                let g = self.grid_entry(*grid);
                g.clear();
                Effect::Content(g.id())
            }
            RedrawEvent::CursorGoto { grid, row, col } => {
                let g = self.grid_entry(*grid);
                g.cursor_goto(*row, *col);
                let id = g.id();
                self.cursor_grid = id;
                Effect::Cursor(id)
            }
            RedrawEvent::Line {
                grid,
                row,
                col_start,
                cells,
            } => {
                let g = self.grid_entry(*grid);
                let writes = expand_runs(cells, g.cols());
                g.write_line(*row, *col_start, &writes, widths);
                Effect::Content(g.id())
            }
            RedrawEvent::Put { cells } => {
                let writes: Vec<CellWrite<'_>> =
                    cells.iter().map(|t| CellWrite::new(t.as_str())).collect();
                let g = self.grid_entry(DEFAULT_GRID);
                g.put(&writes, widths);
                let id = g.id();
                self.cursor_grid = id;
                Effect::Cursor(id)
            }
            RedrawEvent::EolClear { grid } => {
                let g = self.grid_entry(*grid);
                g.eol_clear();
                Effect::Content(g.id())
            }
            RedrawEvent::HighlightDefine { id, attrs } => {
                self.highlights.define(*id, attrs);
                Effect::Highlights
            }
            RedrawEvent::HighlightSet { attrs } => {
                let id = self.highlights.intern(attrs);
                self.grid_entry(DEFAULT_GRID).highlight_set(id);
                Effect::None
            }
            RedrawEvent::SetScrollRegion { grid, region } => {
                self.grid_entry(*grid).set_scroll_region(*region);
                Effect::None
            }
            RedrawEvent::Scroll {
                grid,
                region,
                count,
            } => {
                let g = self.grid_entry(*grid);
                if region.is_some() {
                    g.set_scroll_region(*region);
                }
                g.scroll(*count);
                Effect::Content(g.id())
            }
            RedrawEvent::DefaultColors { fg, bg, sp } => self.set_defaults(DefaultColors {
                fg: Color::from_wire(*fg),
                bg: Color::from_wire(*bg),
                sp: Color::from_wire(*sp),
            }),
            RedrawEvent::UpdateFg(c) => self.set_defaults(DefaultColors {
                fg: Color::from_wire(*c),
                ..self.defaults
            }),
            RedrawEvent::UpdateBg(c) => self.set_defaults(DefaultColors {
                bg: Color::from_wire(*c),
                ..self.defaults
            }),
            RedrawEvent::UpdateSp(c) => self.set_defaults(DefaultColors {
                sp: Color::from_wire(*c),
                ..self.defaults
            }),
            RedrawEvent::GridDestroy { grid } => {
                let id = self.route(*grid);
                if id == DEFAULT_GRID {
                    tracing::debug!(target: "grid.dispatch", set = self.name, "default_grid_destroy_ignored");
                    return Effect::None;
                }
                self.grids.remove(&id);
                self.viewports.remove(&id);
                if self.cursor_grid == id {
                    self.cursor_grid = DEFAULT_GRID;
                }
                Effect::Destroyed(id)
            }
            RedrawEvent::WinViewport {
                grid,
                top_line,
                bottom_line,
                cursor_line,
                cursor_col,
            } => {
                let id = self.route(*grid);
                self.viewports.insert(
                    id,
                    Viewport {
                        top_line: *top_line,
                        bottom_line: *bottom_line,
                        cursor_line: *cursor_line,
                        cursor_col: *cursor_col,
                    },
                );
                Effect::Viewport(id)
            }
            RedrawEvent::ModeInfoSet {
                cursor_style_enabled,
                modes,
            } => {
                self.cursor_style_enabled = *cursor_style_enabled;
                self.modes = modes.clone();
                Effect::Mode
            }
            RedrawEvent::ModeChange { mode, index } => {
                if *index >= self.modes.len() {
                    tracing::debug!(target: "grid.dispatch", set = self.name, mode = mode.as_str(), index, "mode_index_unknown");
                }
                self.mode_index = *index;
                self.mode.clone_from(mode);
                Effect::Mode
            }
            RedrawEvent::Flush => Effect::Flush,
        }
    }

    fn set_defaults(&mut self, next: DefaultColors) -> Effect {
        if next == self.defaults {
            return Effect::None;
        }
        tracing::debug!(
            target: "grid.dispatch",
            set = self.name,
            fg = next.fg.to_rgb(),
            bg = next.bg.to_rgb(),
            "default_colors_changed"
        );
        self.defaults = next;
        // Every cell without explicit colors changes appearance.
        self.queue_redraw_all();
        Effect::DefaultColors
    }
}

/// Expand `grid_line` runs into single-cell writes.
///
/// A run without a highlight id continues the previous run's highlight
/// (highlight 0 before the first id). Repeats are capped at the grid width;
/// anything beyond is dropped by the grid anyway.
fn expand_runs(runs: &[CellRun], cols: usize) -> Vec<CellWrite<'_>> {
    let mut out = Vec::with_capacity(runs.len());
    let mut hl: HighlightId = 0;
    for run in runs {
        if let Some(id) = run.hl {
            hl = id;
        }
        let repeat = run.repeat.min(cols);
        for _ in 0..repeat {
            out.push(CellWrite::with_hl(run.text.as_str(), hl));
        }
        if out.len() >= cols {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_protocol::{HlAttrs, ScrollRegion};
    use core_text::UnicodeGlyphWidth;
    use pretty_assertions::assert_eq;

    fn run(text: &str, hl: Option<u32>, repeat: usize) -> CellRun {
        CellRun {
            text: text.to_string(),
            hl,
            repeat,
        }
    }

    #[test]
    fn missing_grid_created_empty_and_ignores_writes() {
        let mut set = GridSet::new("test", true);
        let effect = set.apply(
            &RedrawEvent::Line {
                grid: 4,
                row: 0,
                col_start: 0,
                cells: vec![run("a", Some(1), 1)],
            },
            &UnicodeGlyphWidth,
        );
        assert_eq!(effect, Effect::Content(4));
        let g = set.grid(4).unwrap();
        assert_eq!((g.rows(), g.cols()), (0, 0));
        assert!(!set.has_damage());
    }

    #[test]
    fn line_expands_repeat_and_carries_highlight() {
        let mut set = GridSet::new("test", true);
        set.apply(&RedrawEvent::Resize { grid: 2, cols: 8, rows: 2 }, &UnicodeGlyphWidth);
        set.apply(
            &RedrawEvent::Line {
                grid: 2,
                row: 1,
                col_start: 1,
                cells: vec![run("a", Some(3), 1), run("-", None, 3), run("b", Some(0), 1)],
            },
            &UnicodeGlyphWidth,
        );
        let g = set.grid(2).unwrap();
        assert_eq!(g.line_text(1), " a---b  ");
        let hls: Vec<u32> = (1..6).map(|c| g.cell(1, c).unwrap().hl).collect();
        assert_eq!(hls, vec![3, 3, 3, 3, 0]);
        assert_eq!(g.cursor(), (0, 0));
    }

    #[test]
    fn legacy_put_uses_interned_highlight() {
        let mut set = GridSet::new("test", true);
        set.apply(&RedrawEvent::Resize { grid: 1, cols: 10, rows: 3 }, &UnicodeGlyphWidth);
        set.apply(
            &RedrawEvent::HighlightSet {
                attrs: HlAttrs { foreground: Some(0xff0000), ..HlAttrs::default() },
            },
            &UnicodeGlyphWidth,
        );
        set.apply(&RedrawEvent::CursorGoto { grid: 1, row: 2, col: 1 }, &UnicodeGlyphWidth);
        let effect =
            set.apply(&RedrawEvent::Put { cells: vec!["o".into(), "k".into()] }, &UnicodeGlyphWidth);
        assert_eq!(effect, Effect::Cursor(1));
        let g = set.grid(1).unwrap();
        assert_eq!(g.cursor(), (2, 3));
        let (fg, _) = set.resolve(g.cell(2, 1).unwrap().hl);
        assert_eq!(fg, Color::from_rgb(0xff0000));
    }

    #[test]
    fn grid_scroll_stores_region_then_scrolls() {
        let mut set = GridSet::new("test", true);
        set.apply(&RedrawEvent::Resize { grid: 1, cols: 2, rows: 4 }, &UnicodeGlyphWidth);
        for row in 0..4 {
            set.apply(
                &RedrawEvent::Line {
                    grid: 1,
                    row,
                    col_start: 0,
                    cells: vec![run(&row.to_string(), Some(0), 2)],
                },
                &UnicodeGlyphWidth,
            );
        }
        let region = ScrollRegion { top: 1, bottom: 3, left: 0, right: 1 };
        set.apply(
            &RedrawEvent::Scroll { grid: 1, region: Some(region), count: 1 },
            &UnicodeGlyphWidth,
        );
        let g = set.grid(1).unwrap();
        assert_eq!(g.scroll_region(), Some(region));
        let lines: Vec<String> = (0..4).map(|r| g.line_text(r)).collect();
        assert_eq!(lines, vec!["00", "22", "33", "  "]);
    }

    #[test]
    fn default_color_change_damages_everything() {
        let mut set = GridSet::new("test", true);
        set.apply(&RedrawEvent::Resize { grid: 1, cols: 4, rows: 4 }, &UnicodeGlyphWidth);
        set.apply(&RedrawEvent::Resize { grid: 2, cols: 3, rows: 2 }, &UnicodeGlyphWidth);
        set.take_damage();
        let effect = set.apply(&RedrawEvent::UpdateBg(0x202020), &UnicodeGlyphWidth);
        assert_eq!(effect, Effect::DefaultColors);
        assert_eq!(
            set.take_damage(),
            vec![(1, CellRect::new(0, 0, 4, 4)), (2, CellRect::new(0, 0, 3, 2))]
        );
        // Same value again is not a change.
        assert_eq!(set.apply(&RedrawEvent::UpdateBg(0x202020), &UnicodeGlyphWidth), Effect::None);
        assert!(!set.has_damage());
    }

    #[test]
    fn destroy_removes_window_grid_but_not_default() {
        let mut set = GridSet::new("test", true);
        set.apply(&RedrawEvent::Resize { grid: 1, cols: 4, rows: 4 }, &UnicodeGlyphWidth);
        set.apply(&RedrawEvent::Resize { grid: 3, cols: 4, rows: 4 }, &UnicodeGlyphWidth);
        set.apply(&RedrawEvent::CursorGoto { grid: 3, row: 1, col: 1 }, &UnicodeGlyphWidth);
        assert_eq!(set.apply(&RedrawEvent::GridDestroy { grid: 3 }, &UnicodeGlyphWidth), Effect::Destroyed(3));
        assert!(set.grid(3).is_none());
        assert_eq!(set.cursor_grid(), DEFAULT_GRID);
        assert_eq!(set.apply(&RedrawEvent::GridDestroy { grid: 1 }, &UnicodeGlyphWidth), Effect::None);
        assert!(set.grid(1).is_some());
    }

    #[test]
    fn cursor_mode_follows_mode_change() {
        use core_protocol::CursorShape;
        let mut set = GridSet::new("test", true);
        let bar = ModeInfo { shape: CursorShape::Vertical, cell_percentage: 25, attr_id: Some(4) };
        assert_eq!(
            set.apply(
                &RedrawEvent::ModeInfoSet { cursor_style_enabled: true, modes: vec![ModeInfo::default(), bar] },
                &UnicodeGlyphWidth,
            ),
            Effect::Mode
        );
        assert_eq!(set.cursor_mode(), ModeInfo::default());
        set.apply(&RedrawEvent::ModeChange { mode: "insert".into(), index: 1 }, &UnicodeGlyphWidth);
        assert_eq!(set.cursor_mode(), bar);
        assert_eq!(set.mode(), "insert");

        // Unknown index and disabled styling both fall back to a block.
        set.apply(&RedrawEvent::ModeChange { mode: "odd".into(), index: 7 }, &UnicodeGlyphWidth);
        assert_eq!(set.cursor_mode(), ModeInfo::default());
        set.apply(&RedrawEvent::ModeChange { mode: "insert".into(), index: 1 }, &UnicodeGlyphWidth);
        set.apply(
            &RedrawEvent::ModeInfoSet { cursor_style_enabled: false, modes: vec![ModeInfo::default(), bar] },
            &UnicodeGlyphWidth,
        );
        assert_eq!(set.cursor_mode(), ModeInfo::default());
    }

    #[test]
    fn single_grid_mode_routes_everything_to_default() {
        let mut set = GridSet::new("minimap", false);
        set.apply(&RedrawEvent::Resize { grid: 7, cols: 3, rows: 1 }, &UnicodeGlyphWidth);
        set.apply(
            &RedrawEvent::WinViewport { grid: 9, top_line: 4, bottom_line: 20, cursor_line: 5, cursor_col: 0 },
            &UnicodeGlyphWidth,
        );
        assert_eq!(set.grid_ids(), vec![DEFAULT_GRID]);
        assert_eq!(set.viewport(1).unwrap().top_line, 4);
    }
}
