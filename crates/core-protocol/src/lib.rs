//! Redraw protocol vocabulary and typed decode.
//!
//! The editor engine pushes `redraw` notifications whose payload is a list of
//! updates, each shaped `[name, args_1, args_2, ...]`: one event name followed
//! by one argument array per invocation. [`RawBatch`] holds that payload as
//! untyped JSON values exactly as the transport handed it over.
//!
//! Everything downstream of this crate works on [`RedrawEvent`]. Decoding
//! happens once, per invocation, in [`decode_batch`]: an invocation whose
//! arguments do not match the expected shape is logged and skipped, the rest of
//! the batch is still delivered. Unknown event names are skipped the same way.
//!
//! Both vocabularies are accepted:
//!
//! * multigrid (`grid_resize`, `grid_line`, `grid_scroll`, `hl_attr_define`, …)
//!   where every grid mutation names its grid;
//! * legacy single-grid (`resize`, `put`, `cursor_goto`, `set_scroll_region`,
//!   `scroll`, `highlight_set`, …) which always targets [`DEFAULT_GRID`].

mod decode;
mod error;

pub use decode::{DecodedBatch, decode_batch, decode_invocation};
pub use error::DecodeError;

use serde_json::Value;

/// Engine-assigned grid identifier.
pub type GridId = u64;

/// The whole-screen grid. Legacy events always target it.
pub const DEFAULT_GRID: GridId = 1;

/// One update from a redraw notification: an event name and one argument
/// array per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub invocations: Vec<Value>,
}

/// All updates of one redraw notification, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub events: Vec<RawEvent>,
}

impl RawBatch {
    /// Build a batch from the notification payload (`[[name, args...], ...]`).
    ///
    /// Updates that are not arrays or lack a string name are dropped with a
    /// warning; only a payload that is not an array at all is an error.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let Value::Array(updates) = value else {
            return Err(DecodeError::MalformedBatch);
        };
        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            let Value::Array(mut parts) = update else {
                tracing::warn!(target: "protocol.decode", "update_not_array");
                continue;
            };
            if parts.is_empty() {
                tracing::warn!(target: "protocol.decode", "update_empty");
                continue;
            }
            let name = match parts.remove(0) {
                Value::String(s) => s,
                _ => {
                    tracing::warn!(target: "protocol.decode", "update_name_not_string");
                    continue;
                }
            };
            events.push(RawEvent {
                name,
                invocations: parts,
            });
        }
        Ok(Self { events })
    }

    /// Convenience for tests and tooling: one event with the given invocations.
    pub fn single(name: impl Into<String>, invocations: Vec<Value>) -> Self {
        Self {
            events: vec![RawEvent {
                name: name.into(),
                invocations,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total invocation count across all updates.
    pub fn invocation_count(&self) -> usize {
        self.events.iter().map(|e| e.invocations.len()).sum()
    }
}

/// Highlight attributes as sent by the engine (`rgb_attr` map).
///
/// Colors are 24-bit RGB integers; `None` means "use the default color".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HlAttrs {
    pub foreground: Option<u32>,
    pub background: Option<u32>,
    pub special: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub undercurl: bool,
    pub strikethrough: bool,
    pub reverse: bool,
    /// 0 (opaque) ..= 100 (fully transparent).
    pub blend: u8,
}

/// One `grid_line` cell group: `text` repeated `repeat` times.
///
/// `hl == None` means "same highlight as the previous cell in this line
/// event"; the first group of an event without an id uses highlight 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRun {
    pub text: String,
    pub hl: Option<u32>,
    pub repeat: usize,
}

/// Scroll rectangle in cells, all bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegion {
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
}

/// Cursor shape of one editor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    /// Bar along the bottom of the cell.
    Horizontal,
    /// Bar along the left of the cell.
    Vertical,
}

/// Cursor style of one mode, from `mode_info_set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    pub shape: CursorShape,
    /// Share of the cell the bar covers, 1..=100. Ignored for blocks.
    pub cell_percentage: u8,
    /// Highlight for the cursor colors; `None` (or 0) inverts the cell.
    pub attr_id: Option<u32>,
}

impl Default for ModeInfo {
    fn default() -> Self {
        Self {
            shape: CursorShape::Block,
            cell_percentage: 100,
            attr_id: None,
        }
    }
}

/// Typed redraw event.
///
/// Row/column arguments stay signed: out-of-range values are clamped by the
/// grid, not rejected here.
#[derive(Debug, Clone, PartialEq)]
pub enum RedrawEvent {
    Resize {
        grid: GridId,
        cols: usize,
        rows: usize,
    },
    Clear {
        grid: GridId,
    },
    CursorGoto {
        grid: GridId,
        row: i64,
        col: i64,
    },
    /// Positioned write; does not move the cursor.
    Line {
        grid: GridId,
        row: i64,
        col_start: i64,
        cells: Vec<CellRun>,
    },
    /// Legacy write at the cursor of [`DEFAULT_GRID`], advancing it.
    Put {
        cells: Vec<String>,
    },
    EolClear {
        grid: GridId,
    },
    HighlightDefine {
        id: u32,
        attrs: HlAttrs,
    },
    /// Legacy: attributes for subsequent `Put`s.
    HighlightSet {
        attrs: HlAttrs,
    },
    /// `None` resets to the whole grid (the wire sends all zeros).
    SetScrollRegion {
        grid: GridId,
        region: Option<ScrollRegion>,
    },
    /// Positive `count` moves content up. `region: None` uses the region
    /// stored by the last `SetScrollRegion`.
    Scroll {
        grid: GridId,
        region: Option<ScrollRegion>,
        count: i64,
    },
    /// Raw color integers; negative means "unset".
    DefaultColors {
        fg: i64,
        bg: i64,
        sp: i64,
    },
    UpdateFg(i64),
    UpdateBg(i64),
    UpdateSp(i64),
    GridDestroy {
        grid: GridId,
    },
    /// Visible buffer lines of a window grid, 0-based, `bottom_line` exclusive.
    WinViewport {
        grid: GridId,
        top_line: i64,
        bottom_line: i64,
        cursor_line: i64,
        cursor_col: i64,
    },
    /// Cursor styles indexed by mode; `cursor_style_enabled: false` means the
    /// engine leaves the cursor shape to the GUI.
    ModeInfoSet {
        cursor_style_enabled: bool,
        modes: Vec<ModeInfo>,
    },
    /// Mode switch; `index` points into the last `ModeInfoSet`.
    ModeChange {
        mode: String,
        index: usize,
    },
    Flush,
}

impl RedrawEvent {
    /// Grid the event mutates, if it is grid-scoped.
    pub fn grid(&self) -> Option<GridId> {
        match self {
            RedrawEvent::Resize { grid, .. }
            | RedrawEvent::Clear { grid }
            | RedrawEvent::CursorGoto { grid, .. }
            | RedrawEvent::Line { grid, .. }
            | RedrawEvent::EolClear { grid }
            | RedrawEvent::SetScrollRegion { grid, .. }
            | RedrawEvent::Scroll { grid, .. }
            | RedrawEvent::GridDestroy { grid }
            | RedrawEvent::WinViewport { grid, .. } => Some(*grid),
            RedrawEvent::Put { .. } => Some(DEFAULT_GRID),
            _ => None,
        }
    }

    /// Short stable name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RedrawEvent::Resize { .. } => "resize",
            RedrawEvent::Clear { .. } => "clear",
            RedrawEvent::CursorGoto { .. } => "cursor_goto",
            RedrawEvent::Line { .. } => "line",
            RedrawEvent::Put { .. } => "put",
            RedrawEvent::EolClear { .. } => "eol_clear",
            RedrawEvent::HighlightDefine { .. } => "highlight_define",
            RedrawEvent::HighlightSet { .. } => "highlight_set",
            RedrawEvent::SetScrollRegion { .. } => "set_scroll_region",
            RedrawEvent::Scroll { .. } => "scroll",
            RedrawEvent::DefaultColors { .. } => "default_colors",
            RedrawEvent::UpdateFg(_) => "update_fg",
            RedrawEvent::UpdateBg(_) => "update_bg",
            RedrawEvent::UpdateSp(_) => "update_sp",
            RedrawEvent::GridDestroy { .. } => "grid_destroy",
            RedrawEvent::WinViewport { .. } => "win_viewport",
            RedrawEvent::ModeInfoSet { .. } => "mode_info_set",
            RedrawEvent::ModeChange { .. } => "mode_change",
            RedrawEvent::Flush => "flush",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_from_payload_splits_name_and_invocations() {
        let batch = RawBatch::from_value(json!([
            ["grid_resize", [1, 80, 24]],
            ["grid_cursor_goto", [1, 0, 0], [1, 2, 3]],
        ]))
        .unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[1].name, "grid_cursor_goto");
        assert_eq!(batch.invocation_count(), 3);
    }

    #[test]
    fn batch_drops_shapeless_updates() {
        let batch = RawBatch::from_value(json!([42, [], [7, [1]], ["flush", []]])).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].name, "flush");
    }

    #[test]
    fn non_array_payload_is_error() {
        assert!(matches!(
            RawBatch::from_value(json!({"a": 1})),
            Err(DecodeError::MalformedBatch)
        ));
    }

    #[test]
    fn put_targets_default_grid() {
        let ev = RedrawEvent::Put { cells: vec![] };
        assert_eq!(ev.grid(), Some(DEFAULT_GRID));
        assert_eq!(RedrawEvent::Flush.grid(), None);
    }
}
