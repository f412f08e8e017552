//! Editor engine boundary.
//!
//! The engine is the external editor process the redraw stream comes from.
//! Besides pushing redraw batches it answers a few synchronous requests the
//! renderer needs: where every window grid sits on the screen (for borders),
//! resize requests, and (for the minimap's secondary instance) reading and
//! replacing buffer lines.
//!
//! Calls may block on RPC round trips. The UI thread never calls the trait
//! directly; it goes through [`spawn_call`], which runs the call on a worker
//! thread. The caller either waits on the [`PendingCall`] with a timeout or
//! polls it on later frames.

use core_protocol::GridId;
use thiserror::Error;

pub mod bounded;
pub mod memory;

pub use bounded::{PendingCall, spawn_call};
pub use memory::MemoryEngine;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine call `{call}` timed out after {timeout_ms} ms")]
    Timeout { call: &'static str, timeout_ms: u64 },
    #[error("engine unreachable during `{0}`")]
    Disconnected(&'static str),
    #[error("engine does not support `{0}`")]
    Unsupported(&'static str),
    #[error("engine rejected `{call}`: {message}")]
    Rejected { call: &'static str, message: String },
}

impl EngineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout { .. })
    }
}

/// Screen placement of one window grid, in cells of the whole-screen grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlacement {
    pub grid: GridId,
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
    /// Floating windows are composited last and never get borders.
    pub floating: bool,
    /// `Normal` background override from the window's highlight mapping, RGB.
    pub background_override: Option<u32>,
}

impl WindowPlacement {
    pub fn new(grid: GridId, row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self {
            grid,
            row,
            col,
            rows,
            cols,
            floating: false,
            background_override: None,
        }
    }

    pub fn floating(mut self) -> Self {
        self.floating = true;
        self
    }

    pub fn with_background(mut self, rgb: u32) -> Self {
        self.background_override = Some(rgb);
        self
    }
}

/// Synchronous requests to the editor engine.
pub trait EditorEngine: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        "engine"
    }

    /// One batched query returning every visible window's placement.
    fn window_placements(&self) -> Result<Vec<WindowPlacement>, EngineError>;

    /// Ask the engine to resize its UI to `cols` x `rows`.
    fn try_resize(&self, cols: usize, rows: usize) -> Result<(), EngineError>;

    fn buffer_lines(&self) -> Result<Vec<String>, EngineError> {
        Err(EngineError::Unsupported("buffer_lines"))
    }

    fn set_buffer_lines(&self, _lines: &[String]) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("set_buffer_lines"))
    }
}
