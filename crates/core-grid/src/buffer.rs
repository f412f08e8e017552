//! Cell storage and mutators for one grid.
//!
//! Rows are allocated on first write and dropped again when a full-width
//! clear or scroll vacates them, so a mostly blank grid costs one `Option` per
//! row. All coordinates coming from the wire are signed and may be out of
//! range while the engine resizes; mutators clamp or ignore, never panic.
//!
//! Invariants:
//! * `cursor_row < rows` and `cursor_col < cols` whenever the grid is non-empty
//!   (both 0 otherwise).
//! * Every mutation that changes visible content widens `damage` to cover it.
//! * A wide glyph's right neighbour, when written in the same run with empty
//!   text, is stored as padding (`normal_width == false`).

use core_protocol::{GridId, ScrollRegion};
use core_text::{GlyphWidth, normalize_cell_text};

use crate::{Cell, DamageTracker, HighlightId};

static EMPTY_CELL: Cell = Cell {
    text: String::new(),
    normal_width: true,
    hl: 0,
};

/// One cell to write: text plus an optional highlight override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWrite<'a> {
    pub text: &'a str,
    pub hl: Option<HighlightId>,
}

impl<'a> CellWrite<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, hl: None }
    }

    pub fn with_hl(text: &'a str, hl: HighlightId) -> Self {
        Self { text, hl: Some(hl) }
    }
}

#[derive(Debug, Clone)]
pub struct GridBuffer {
    id: GridId,
    rows: usize,
    cols: usize,
    content: Vec<Option<Vec<Cell>>>,
    cursor_row: usize,
    cursor_col: usize,
    active_hl: HighlightId,
    scroll_region: Option<ScrollRegion>,
    damage: DamageTracker,
}

impl GridBuffer {
    /// An empty 0x0 grid; writes are ignored until the first resize.
    pub fn new(id: GridId) -> Self {
        Self {
            id,
            rows: 0,
            cols: 0,
            content: Vec::new(),
            cursor_row: 0,
            cursor_col: 0,
            active_hl: 0,
            scroll_region: None,
            damage: DamageTracker::new(0, 0),
        }
    }

    pub fn with_size(id: GridId, rows: usize, cols: usize) -> Self {
        let mut grid = Self::new(id);
        grid.resize(rows, cols);
        grid
    }

    #[inline]
    pub fn id(&self) -> GridId {
        self.id
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// `(row, col)` of the cursor.
    #[inline]
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    #[inline]
    pub fn active_highlight(&self) -> HighlightId {
        self.active_hl
    }

    pub fn scroll_region(&self) -> Option<ScrollRegion> {
        self.scroll_region
    }

    pub fn damage(&self) -> &DamageTracker {
        &self.damage
    }

    pub fn damage_mut(&mut self) -> &mut DamageTracker {
        &mut self.damage
    }

    /// Cell at `(row, col)`; `None` only when out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(match &self.content[row] {
            Some(cells) => &cells[col],
            None => &EMPTY_CELL,
        })
    }

    /// Allocated cells of `row`, `None` for never-written or vacated rows.
    pub fn row_cells(&self, row: usize) -> Option<&[Cell]> {
        self.content.get(row).and_then(|r| r.as_deref())
    }

    /// Visible text of `row`: blanks for empty cells, padding cells skipped.
    pub fn line_text(&self, row: usize) -> String {
        let Some(cells) = self.row_cells(row) else {
            return " ".repeat(if row < self.rows { self.cols } else { 0 });
        };
        let mut out = String::with_capacity(cells.len());
        for cell in cells {
            if cell.is_padding() {
                continue;
            }
            if cell.text.is_empty() {
                out.push(' ');
            } else {
                out.push_str(&cell.text);
            }
        }
        out
    }

    // ---------------------------------------------------------------------------------------------
    // Mutators
    // ---------------------------------------------------------------------------------------------

    /// Reallocate to `rows` x `cols`, discarding content; cursor to origin and
    /// the whole grid damaged.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        tracing::trace!(target: "grid.buffer", grid = self.id, rows, cols, "resize");
        self.rows = rows;
        self.cols = cols;
        self.content = vec![None; rows];
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.scroll_region = None;
        self.damage.set_extent(cols, rows);
        self.damage.queue_redraw_all();
    }

    /// Same as resizing to the current dimensions.
    pub fn clear(&mut self) {
        self.resize(self.rows, self.cols);
    }

    /// Move the cursor, clamping into the grid. No damage.
    pub fn cursor_goto(&mut self, row: i64, col: i64) {
        self.cursor_row = clamp_index(row, self.rows);
        self.cursor_col = clamp_index(col, self.cols);
    }

    pub fn highlight_set(&mut self, hl: HighlightId) {
        self.active_hl = hl;
    }

    /// Store the region used by subsequent `scroll` calls; `None` is the whole grid.
    pub fn set_scroll_region(&mut self, region: Option<ScrollRegion>) {
        self.scroll_region = region;
    }

    /// Write `cells` at the cursor and advance it by the number written.
    ///
    /// Cells without an override use the active highlight. Returns the number
    /// of cells written; cells past the last column are dropped.
    pub fn put(&mut self, cells: &[CellWrite<'_>], widths: &dyn GlyphWidth) -> usize {
        if self.is_empty() {
            return 0;
        }
        let (row, start) = (self.cursor_row, self.cursor_col);
        let written = self.write_run(row, start, cells, self.active_hl, widths);
        self.cursor_col = (start + written).min(self.cols - 1);
        written
    }

    /// Write `cells` at `(row, col_start)` without moving the cursor.
    ///
    /// Cells without an override use highlight 0. A row outside the grid is
    /// ignored; the start column is clamped to the last column.
    pub fn write_line(
        &mut self,
        row: i64,
        col_start: i64,
        cells: &[CellWrite<'_>],
        widths: &dyn GlyphWidth,
    ) -> usize {
        if self.is_empty() || row < 0 || row as u64 >= self.rows as u64 {
            tracing::trace!(target: "grid.buffer", grid = self.id, row, rows = self.rows, "line_out_of_range");
            return 0;
        }
        let start = clamp_index(col_start, self.cols);
        self.write_run(row as usize, start, cells, 0, widths)
    }

    fn write_run(
        &mut self,
        row: usize,
        start: usize,
        cells: &[CellWrite<'_>],
        default_hl: HighlightId,
        widths: &dyn GlyphWidth,
    ) -> usize {
        let (id, cols) = (self.id, self.cols);
        let line = self.row_mut(row);
        let left_is_wide = start > 0 && line[start - 1].is_wide();
        let mut after_wide = left_is_wide;
        let mut last_wide = false;
        let mut col = start;
        for write in cells {
            if col >= cols {
                break;
            }
            let text = normalize_cell_text(write.text);
            let normal_width = if text.is_empty() {
                !after_wide
            } else {
                widths.is_normal_width(&text)
            };
            let cell = &mut line[col];
            cell.text = text;
            cell.normal_width = normal_width;
            cell.hl = write.hl.unwrap_or(default_hl);
            after_wide = cell.is_wide();
            last_wide = after_wide;
            col += 1;
        }
        let right_padding = col < cols && line[col].is_padding();
        let written = col - start;
        if written < cells.len() {
            tracing::trace!(target: "grid.buffer", grid = id, row, dropped = cells.len() - written, "put_clipped");
        }
        if written == 0 {
            return 0;
        }
        // The glyph on the left may bleed over the written span; a wide glyph
        // (new, or stale padding from an old one) extends one cell to the right.
        let x0 = if left_is_wide { start - 1 } else { start };
        let x1 = if (last_wide || right_padding) && col < cols {
            col + 1
        } else {
            col
        };
        self.damage.queue_redraw(x0, row, x1 - x0, 1);
        written
    }

    /// Clear from the cursor column to the end of the cursor row.
    pub fn eol_clear(&mut self) {
        if self.is_empty() {
            return;
        }
        let (row, col) = (self.cursor_row, self.cursor_col);
        self.clear_span(row, col, self.cols - 1);
        self.damage.queue_redraw(col, row, self.cols - col, 1);
    }

    /// Shift the scroll region by `count` rows; positive moves content up.
    ///
    /// Vacated rows are cleared. Damages the region and the vacated strip.
    pub fn scroll(&mut self, count: i64) {
        let Some((top, bot, left, right)) = self.resolved_region() else {
            return;
        };
        if count == 0 {
            return;
        }
        let height = bot - top + 1;
        let n = usize::try_from(count.unsigned_abs())
            .unwrap_or(usize::MAX)
            .min(height);
        tracing::trace!(target: "grid.buffer", grid = self.id, top, bot, left, right, count, "scroll");

        let vacated_top = if count > 0 {
            // Content moves up: copy top-down so sources are read before overwrite.
            for row in top..=bot {
                if row + n > bot {
                    break;
                }
                self.copy_span(row + n, row, left, right);
            }
            bot + 1 - n
        } else {
            for row in (top + n..=bot).rev() {
                self.copy_span(row - n, row, left, right);
            }
            top
        };
        for row in vacated_top..vacated_top + n {
            self.clear_span(row, left, right);
        }
        let width = right - left + 1;
        self.damage.queue_redraw(left, top, width, height);
        self.damage.queue_redraw(left, vacated_top, width, n);
    }

    // ---------------------------------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------------------------------

    fn row_mut(&mut self, row: usize) -> &mut Vec<Cell> {
        let cols = self.cols;
        self.content[row].get_or_insert_with(|| vec![Cell::default(); cols])
    }

    #[inline]
    fn is_full_width(&self, left: usize, right: usize) -> bool {
        left == 0 && right + 1 == self.cols
    }

    fn copy_span(&mut self, src: usize, dst: usize, left: usize, right: usize) {
        if self.is_full_width(left, right) {
            // Sources not reused as destinations are vacated rows, cleared right after.
            self.content[dst] = self.content[src].take();
            return;
        }
        match self.content[src].as_ref().map(|r| r[left..=right].to_vec()) {
            Some(cells) => self.row_mut(dst)[left..=right].clone_from_slice(&cells),
            None => self.clear_span(dst, left, right),
        }
    }

    fn clear_span(&mut self, row: usize, left: usize, right: usize) {
        if self.is_full_width(left, right) {
            self.content[row] = None;
            return;
        }
        if let Some(cells) = self.content[row].as_mut() {
            for cell in &mut cells[left..=right] {
                cell.reset();
            }
        }
    }

    /// Inclusive `(top, bottom, left, right)` clamped into the grid.
    fn resolved_region(&self) -> Option<(usize, usize, usize, usize)> {
        if self.is_empty() {
            return None;
        }
        let (top, bot, left, right) = match self.scroll_region {
            None => (0, self.rows - 1, 0, self.cols - 1),
            Some(r) => (
                clamp_index(r.top, self.rows),
                clamp_index(r.bottom, self.rows),
                clamp_index(r.left, self.cols),
                clamp_index(r.right, self.cols),
            ),
        };
        (top <= bot && left <= right).then_some((top, bot, left, right))
    }
}

/// Clamp a signed wire index into `0..len` (0 when `len == 0`).
#[inline]
fn clamp_index(value: i64, len: usize) -> usize {
    if len == 0 || value <= 0 {
        return 0;
    }
    usize::try_from(value).map_or(len - 1, |v| v.min(len - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellRect;
    use core_text::UnicodeGlyphWidth;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn writes(s: &str) -> Vec<CellWrite<'_>> {
        // One write per char; tests stick to single-codepoint clusters.
        s.char_indices()
            .map(|(i, c)| CellWrite::new(&s[i..i + c.len_utf8()]))
            .collect()
    }

    fn fill(grid: &mut GridBuffer) {
        for row in 0..grid.rows() {
            let line: String = (0..grid.cols())
                .map(|c| char::from(b'a' + ((row * 7 + c) % 26) as u8))
                .collect();
            grid.write_line(row as i64, 0, &writes(&line), &UnicodeGlyphWidth);
        }
        grid.damage_mut().clear();
    }

    #[test]
    fn clear_is_idempotent() {
        let mut g = GridBuffer::with_size(1, 5, 20);
        fill(&mut g);
        g.cursor_goto(3, 4);
        g.clear();
        let snapshot: Vec<String> = (0..5).map(|r| g.line_text(r)).collect();
        let first = g.damage_mut().take();
        g.clear();
        let again: Vec<String> = (0..5).map(|r| g.line_text(r)).collect();
        assert_eq!(snapshot, again);
        assert_eq!(first, g.damage_mut().take());
        assert_eq!(g.cursor(), (0, 0));
        assert!(g.row_cells(0).is_none());
    }

    #[test]
    fn put_advances_cursor_by_written_count() {
        let mut g = GridBuffer::with_size(1, 5, 20);
        g.cursor_goto(1, 2);
        let n = g.put(&writes("hello"), &UnicodeGlyphWidth);
        assert_eq!(n, 5);
        assert_eq!(g.cursor(), (1, 7));
        assert_eq!(g.line_text(1), "  hello             ");
    }

    #[test]
    fn single_character_insert_damages_one_cell() {
        let mut g = GridBuffer::with_size(1, 5, 20);
        g.damage_mut().clear();
        g.cursor_goto(2, 3);
        g.put(&[CellWrite::with_hl("x", 7)], &UnicodeGlyphWidth);
        assert_eq!(g.cell(2, 3), Some(&Cell::new("x", true, 7)));
        assert_eq!(g.damage_mut().take(), Some(CellRect::new(3, 2, 1, 1)));
    }

    #[test]
    fn wide_glyph_pairs_with_padding() {
        let mut g = GridBuffer::with_size(1, 2, 10);
        g.damage_mut().clear();
        g.write_line(0, 2, &[CellWrite::new("漢"), CellWrite::new(""), CellWrite::new("a")], &UnicodeGlyphWidth);
        let lead = g.cell(0, 2).unwrap();
        let pad = g.cell(0, 3).unwrap();
        assert!(lead.is_wide());
        assert!(pad.is_padding());
        assert!(g.cell(0, 4).unwrap().normal_width);
        assert_eq!(g.line_text(0), "  漢a     ");
    }

    #[test]
    fn wide_glyph_bleed_extends_damage_both_sides() {
        let mut g = GridBuffer::with_size(1, 1, 10);
        g.write_line(0, 2, &[CellWrite::new("漢"), CellWrite::new("")], &UnicodeGlyphWidth);
        g.damage_mut().clear();
        // Overwrite the padding cell: the leader on the left must be repainted.
        g.write_line(0, 3, &[CellWrite::new("b")], &UnicodeGlyphWidth);
        assert_eq!(g.damage_mut().take(), Some(CellRect::new(2, 0, 2, 1)));
        // A wide glyph at the end of a run damages the cell on its right.
        g.write_line(0, 6, &[CellWrite::new("字")], &UnicodeGlyphWidth);
        assert_eq!(g.damage_mut().take(), Some(CellRect::new(6, 0, 2, 1)));
    }

    #[test]
    fn out_of_range_writes_clamp_and_continue() {
        let mut g = GridBuffer::with_size(1, 3, 4);
        assert_eq!(g.write_line(0, 99, &writes("xy"), &UnicodeGlyphWidth), 1);
        assert_eq!(g.cell(0, 3).unwrap().text, "x");
        assert_eq!(g.write_line(7, 0, &writes("z"), &UnicodeGlyphWidth), 0);
        assert_eq!(g.write_line(-1, 0, &writes("z"), &UnicodeGlyphWidth), 0);
        g.cursor_goto(-5, 100);
        assert_eq!(g.cursor(), (0, 3));
        g.put(&writes("abc"), &UnicodeGlyphWidth);
        assert_eq!(g.cursor(), (0, 3));
    }

    #[test]
    fn empty_grid_ignores_writes() {
        let mut g = GridBuffer::new(5);
        assert_eq!(g.put(&writes("abc"), &UnicodeGlyphWidth), 0);
        g.eol_clear();
        g.scroll(2);
        assert!(g.damage().is_empty());
        assert_eq!(g.cursor(), (0, 0));
    }

    #[test]
    fn eol_clear_from_cursor() {
        let mut g = GridBuffer::with_size(1, 2, 6);
        g.write_line(1, 0, &writes("abcdef"), &UnicodeGlyphWidth);
        g.damage_mut().clear();
        g.cursor_goto(1, 2);
        g.eol_clear();
        assert_eq!(g.line_text(1), "ab    ");
        assert_eq!(g.damage_mut().take(), Some(CellRect::new(2, 1, 4, 1)));
    }

    #[test]
    fn put_uses_active_highlight_unless_overridden() {
        let mut g = GridBuffer::with_size(1, 1, 4);
        g.highlight_set(9);
        g.put(&[CellWrite::new("a"), CellWrite::with_hl("b", 2)], &UnicodeGlyphWidth);
        assert_eq!(g.cell(0, 0).unwrap().hl, 9);
        assert_eq!(g.cell(0, 1).unwrap().hl, 2);
    }

    #[test]
    fn scroll_region_shift_up() {
        let mut g = GridBuffer::with_size(1, 12, 4);
        for row in 0..12 {
            let line = format!("{:>4}", row);
            g.write_line(row, 0, &writes(&line), &UnicodeGlyphWidth);
        }
        g.damage_mut().clear();
        g.set_scroll_region(Some(ScrollRegion { top: 0, bottom: 9, left: 0, right: 3 }));
        g.scroll(3);
        for row in 0..=6 {
            assert_eq!(g.line_text(row), format!("{:>4}", row + 3));
        }
        for row in 7..=9 {
            assert_eq!(g.line_text(row), "    ");
        }
        assert_eq!(g.line_text(10), "  10");
        assert_eq!(g.damage_mut().take(), Some(CellRect::new(0, 0, 4, 10)));
    }

    #[test]
    fn partial_width_scroll_leaves_outside_columns() {
        let mut g = GridBuffer::with_size(1, 3, 4);
        g.write_line(0, 0, &writes("abcd"), &UnicodeGlyphWidth);
        g.write_line(1, 0, &writes("efgh"), &UnicodeGlyphWidth);
        g.write_line(2, 0, &writes("ijkl"), &UnicodeGlyphWidth);
        g.set_scroll_region(Some(ScrollRegion { top: 0, bottom: 2, left: 1, right: 2 }));
        g.scroll(-1);
        assert_eq!(g.line_text(0), "a  d");
        assert_eq!(g.line_text(1), "ebch");
        assert_eq!(g.line_text(2), "ifgl");
    }

    #[test]
    fn oversized_scroll_clears_region() {
        let mut g = GridBuffer::with_size(1, 4, 2);
        fill(&mut g);
        g.scroll(50);
        for row in 0..4 {
            assert!(g.row_cells(row).is_none());
        }
    }

    proptest! {
        #[test]
        fn scroll_round_trip_loses_only_k_rows(rows in 2usize..16, cols in 1usize..8, k in 1usize..16) {
            let k = k.min(rows);
            let mut g = GridBuffer::with_size(1, rows, cols);
            fill(&mut g);
            let before: Vec<String> = (0..rows).map(|r| g.line_text(r)).collect();
            g.scroll(k as i64);
            g.scroll(-(k as i64));
            for row in 0..rows {
                if row < k {
                    prop_assert_eq!(g.line_text(row), " ".repeat(cols));
                } else {
                    prop_assert_eq!(&g.line_text(row), &before[row]);
                }
            }
        }
    }
}
