use serde_json::{Map, Value};

use crate::{
    CellRun, CursorShape, DEFAULT_GRID, DecodeError, GridId, HlAttrs, ModeInfo, RawBatch,
    RedrawEvent, ScrollRegion,
};

/// Result of decoding one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub events: Vec<RedrawEvent>,
    /// Invocations dropped because their arguments were malformed.
    pub errors: usize,
    /// Updates dropped because the event name is not part of the vocabulary.
    pub unknown: usize,
}

/// Decode every invocation of `batch`, preserving order.
///
/// Consecutive legacy `put` invocations of one update are merged into a
/// single [`RedrawEvent::Put`] so the grid sees the whole run at once.
pub fn decode_batch(batch: &RawBatch) -> DecodedBatch {
    let mut out = DecodedBatch {
        events: Vec::with_capacity(batch.invocation_count()),
        ..DecodedBatch::default()
    };
    let empty = Value::Array(Vec::new());
    for raw in &batch.events {
        // `["flush"]` without an argument array still means one invocation.
        let invocations: &[Value] = if raw.invocations.is_empty() {
            std::slice::from_ref(&empty)
        } else {
            &raw.invocations
        };
        let mut merging_put = false;
        for args in invocations {
            match decode_invocation(&raw.name, args) {
                Ok(RedrawEvent::Put { cells }) if merging_put => {
                    if let Some(RedrawEvent::Put { cells: run }) = out.events.last_mut() {
                        run.extend(cells);
                    }
                }
                Ok(event) => {
                    merging_put = matches!(event, RedrawEvent::Put { .. });
                    out.events.push(event);
                }
                Err(DecodeError::UnknownEvent(_)) => {
                    tracing::debug!(target: "protocol.decode", event = raw.name.as_str(), "unknown_event");
                    out.unknown += 1;
                    break;
                }
                Err(err) => {
                    tracing::warn!(target: "protocol.decode", event = raw.name.as_str(), error = %err, "decode_error");
                    out.errors += 1;
                    merging_put = false;
                }
            }
        }
    }
    out
}

/// Decode a single invocation of event `name`.
pub fn decode_invocation(name: &str, args: &Value) -> Result<RedrawEvent, DecodeError> {
    match name {
        "grid_resize" => {
            let a = Args::new("grid_resize", args, 3)?;
            Ok(RedrawEvent::Resize {
                grid: a.grid(0)?,
                cols: a.size(1)?,
                rows: a.size(2)?,
            })
        }
        "resize" => {
            let a = Args::new("resize", args, 2)?;
            Ok(RedrawEvent::Resize {
                grid: DEFAULT_GRID,
                cols: a.size(0)?,
                rows: a.size(1)?,
            })
        }
        "grid_clear" => {
            let a = Args::new("grid_clear", args, 1)?;
            Ok(RedrawEvent::Clear { grid: a.grid(0)? })
        }
        "clear" => {
            Args::new("clear", args, 0)?;
            Ok(RedrawEvent::Clear { grid: DEFAULT_GRID })
        }
        "grid_cursor_goto" => {
            let a = Args::new("grid_cursor_goto", args, 3)?;
            Ok(RedrawEvent::CursorGoto {
                grid: a.grid(0)?,
                row: a.int(1)?,
                col: a.int(2)?,
            })
        }
        "cursor_goto" => {
            let a = Args::new("cursor_goto", args, 2)?;
            Ok(RedrawEvent::CursorGoto {
                grid: DEFAULT_GRID,
                row: a.int(0)?,
                col: a.int(1)?,
            })
        }
        "grid_line" => {
            let a = Args::new("grid_line", args, 4)?;
            let raw_cells = a.array(3)?;
            let mut cells = Vec::with_capacity(raw_cells.len());
            for (i, cell) in raw_cells.iter().enumerate() {
                cells.push(decode_cell(cell, i)?);
            }
            Ok(RedrawEvent::Line {
                grid: a.grid(0)?,
                row: a.int(1)?,
                col_start: a.int(2)?,
                cells,
            })
        }
        "put" => {
            let a = Args::new("put", args, 1)?;
            Ok(RedrawEvent::Put {
                cells: vec![a.string(0)?.to_string()],
            })
        }
        "eol_clear" => {
            Args::new("eol_clear", args, 0)?;
            Ok(RedrawEvent::EolClear { grid: DEFAULT_GRID })
        }
        "hl_attr_define" => {
            let a = Args::new("hl_attr_define", args, 2)?;
            let id = a.int(0)?;
            let id = u32::try_from(id).map_err(|_| a.type_error(0, "a highlight id"))?;
            Ok(RedrawEvent::HighlightDefine {
                id,
                attrs: decode_attrs(a.map(1)?),
            })
        }
        "highlight_set" => {
            let a = Args::new("highlight_set", args, 1)?;
            Ok(RedrawEvent::HighlightSet {
                attrs: decode_attrs(a.map(0)?),
            })
        }
        "set_scroll_region" => {
            let a = Args::new("set_scroll_region", args, 4)?;
            let region = ScrollRegion {
                top: a.int(0)?,
                bottom: a.int(1)?,
                left: a.int(2)?,
                right: a.int(3)?,
            };
            let all_zero =
                region.top == 0 && region.bottom == 0 && region.left == 0 && region.right == 0;
            Ok(RedrawEvent::SetScrollRegion {
                grid: DEFAULT_GRID,
                region: (!all_zero).then_some(region),
            })
        }
        "scroll" => {
            let a = Args::new("scroll", args, 1)?;
            Ok(RedrawEvent::Scroll {
                grid: DEFAULT_GRID,
                region: None,
                count: a.int(0)?,
            })
        }
        "grid_scroll" => {
            // Wire bounds for bottom/right are exclusive.
            let a = Args::new("grid_scroll", args, 6)?;
            Ok(RedrawEvent::Scroll {
                grid: a.grid(0)?,
                region: Some(ScrollRegion {
                    top: a.int(1)?,
                    bottom: a.int(2)? - 1,
                    left: a.int(3)?,
                    right: a.int(4)? - 1,
                }),
                count: a.int(5)?,
            })
        }
        "default_colors_set" => {
            let a = Args::new("default_colors_set", args, 3)?;
            Ok(RedrawEvent::DefaultColors {
                fg: a.int(0)?,
                bg: a.int(1)?,
                sp: a.int(2)?,
            })
        }
        "update_fg" => Ok(RedrawEvent::UpdateFg(Args::new("update_fg", args, 1)?.int(0)?)),
        "update_bg" => Ok(RedrawEvent::UpdateBg(Args::new("update_bg", args, 1)?.int(0)?)),
        "update_sp" => Ok(RedrawEvent::UpdateSp(Args::new("update_sp", args, 1)?.int(0)?)),
        "grid_destroy" => {
            let a = Args::new("grid_destroy", args, 1)?;
            Ok(RedrawEvent::GridDestroy { grid: a.grid(0)? })
        }
        "win_viewport" => {
            // Argument 1 is the window handle; the grid id is what we key on.
            let a = Args::new("win_viewport", args, 6)?;
            Ok(RedrawEvent::WinViewport {
                grid: a.grid(0)?,
                top_line: a.int(2)?,
                bottom_line: a.int(3)?,
                cursor_line: a.int(4)?,
                cursor_col: a.int(5)?,
            })
        }
        "mode_info_set" => {
            let a = Args::new("mode_info_set", args, 2)?;
            let enabled = a.items[0]
                .as_bool()
                .ok_or_else(|| a.type_error(0, "a boolean"))?;
            let mut modes = Vec::new();
            for entry in a.array(1)? {
                let map = entry
                    .as_object()
                    .ok_or_else(|| a.type_error(1, "an array of mode maps"))?;
                modes.push(decode_mode_info(map));
            }
            Ok(RedrawEvent::ModeInfoSet {
                cursor_style_enabled: enabled,
                modes,
            })
        }
        "mode_change" => {
            let a = Args::new("mode_change", args, 2)?;
            Ok(RedrawEvent::ModeChange {
                mode: a.string(0)?.to_string(),
                index: a.size(1)?,
            })
        }
        "flush" => Ok(RedrawEvent::Flush),
        other => Err(DecodeError::UnknownEvent(other.to_string())),
    }
}

fn decode_cell(cell: &Value, index: usize) -> Result<CellRun, DecodeError> {
    let parts = cell.as_array().ok_or(DecodeError::Type {
        event: "grid_line",
        index: 3,
        expected: "an array of cell arrays",
    })?;
    let cell_err = |expected| DecodeError::Type {
        event: "grid_line",
        index,
        expected,
    };
    let text = parts
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| cell_err("a cell with leading text"))?;
    let hl = match parts.get(1) {
        None => None,
        Some(v) => Some(
            as_int(v)
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| cell_err("a cell with an integer highlight"))?,
        ),
    };
    let repeat = match parts.get(2) {
        None => 1,
        Some(v) => as_int(v)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| cell_err("a cell with a non-negative repeat"))?,
    };
    Ok(CellRun {
        text: text.to_string(),
        hl,
        repeat,
    })
}

fn decode_attrs(map: &Map<String, Value>) -> HlAttrs {
    let color = |key: &str| {
        map.get(key)
            .and_then(as_int)
            .filter(|c| *c >= 0)
            .map(|c| (c & 0xFF_FFFF) as u32)
    };
    let flag = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
    HlAttrs {
        foreground: color("foreground"),
        background: color("background"),
        special: color("special"),
        bold: flag("bold"),
        italic: flag("italic"),
        underline: flag("underline"),
        undercurl: flag("undercurl"),
        strikethrough: flag("strikethrough"),
        reverse: flag("reverse"),
        blend: map
            .get("blend")
            .and_then(as_int)
            .map(|b| b.clamp(0, 100) as u8)
            .unwrap_or(0),
    }
}

fn decode_mode_info(map: &Map<String, Value>) -> ModeInfo {
    let shape = match map.get("cursor_shape").and_then(Value::as_str) {
        Some("horizontal") => CursorShape::Horizontal,
        Some("vertical") => CursorShape::Vertical,
        _ => CursorShape::Block,
    };
    ModeInfo {
        shape,
        cell_percentage: map
            .get("cell_percentage")
            .and_then(as_int)
            .map(|p| p.clamp(1, 100) as u8)
            .unwrap_or(100),
        attr_id: map
            .get("attr_id")
            .and_then(as_int)
            .and_then(|id| u32::try_from(id).ok())
            .filter(|id| *id != 0),
    }
}

#[inline]
fn as_int(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_u64().and_then(|u| i64::try_from(u).ok()))
}

struct Args<'a> {
    event: &'static str,
    items: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(event: &'static str, value: &'a Value, min: usize) -> Result<Self, DecodeError> {
        let items = value
            .as_array()
            .ok_or(DecodeError::NotAnArray { event })?;
        if items.len() < min {
            return Err(DecodeError::Arity {
                event,
                expected: min,
                got: items.len(),
            });
        }
        Ok(Self { event, items })
    }

    fn type_error(&self, index: usize, expected: &'static str) -> DecodeError {
        DecodeError::Type {
            event: self.event,
            index,
            expected,
        }
    }

    fn int(&self, index: usize) -> Result<i64, DecodeError> {
        as_int(&self.items[index]).ok_or_else(|| self.type_error(index, "an integer"))
    }

    fn size(&self, index: usize) -> Result<usize, DecodeError> {
        let v = self.int(index)?;
        usize::try_from(v).map_err(|_| self.type_error(index, "a non-negative integer"))
    }

    fn grid(&self, index: usize) -> Result<GridId, DecodeError> {
        let v = self.int(index)?;
        GridId::try_from(v).map_err(|_| self.type_error(index, "a grid id"))
    }

    fn string(&self, index: usize) -> Result<&'a str, DecodeError> {
        self.items[index]
            .as_str()
            .ok_or_else(|| self.type_error(index, "a string"))
    }

    fn array(&self, index: usize) -> Result<&'a [Value], DecodeError> {
        self.items[index]
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| self.type_error(index, "an array"))
    }

    fn map(&self, index: usize) -> Result<&'a Map<String, Value>, DecodeError> {
        self.items[index]
            .as_object()
            .ok_or_else(|| self.type_error(index, "a map"))
    }
}
