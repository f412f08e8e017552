//! Grid state: cells, highlights, per-grid damage and event dispatch.
//!
//! This crate is the state machine a redraw stream drives. It knows nothing
//! about pixels beyond converting damage rectangles with caller-supplied
//! metrics, and nothing about the transport beyond the typed events of
//! `core-protocol`.
//!
//! Layers, leaves first:
//! - `color` / `highlight`: resolved colors, attribute flags, the highlight
//!   table (append/overwrite only; `reverse` applied at read time).
//! - `cell`: one cell, including the wide glyph / padding convention.
//! - `damage`: bounding-rectangle accumulation with pixel flush.
//! - `buffer`: one grid's cells, cursor, active highlight, scroll region and
//!   damage; all mutators clamp instead of failing.
//! - `set`: a set of grids plus shared highlight/default-color state;
//!   `GridSet::apply` maps each `RedrawEvent` onto the right grid.
//!
//! Nothing in here is thread-safe; a `GridSet` lives on the UI thread.

mod buffer;
mod cell;
mod color;
mod damage;
mod highlight;
mod set;

pub use buffer::{CellWrite, GridBuffer};
pub use cell::Cell;
pub use color::Color;
pub use damage::{CellRect, DamageTracker, PixelRect};
pub use highlight::{DefaultColors, Highlight, HighlightId, HighlightTable, HlFlags, LEGACY_HL_BASE};
pub use set::{Effect, GridSet, Viewport};

pub use core_protocol::{CursorShape, DEFAULT_GRID, GridId, ModeInfo};
