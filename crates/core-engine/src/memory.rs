//! In-process engine double.
//!
//! Answers from state set by the caller, with optional artificial latency and
//! an "unreachable" switch. Used by the replay binary (which has no live
//! engine) and throughout the tests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{EditorEngine, EngineError, WindowPlacement};

#[derive(Debug, Default)]
struct State {
    placements: Vec<WindowPlacement>,
    resize_requests: Vec<(usize, usize)>,
    lines: Vec<String>,
    latency: Duration,
    unreachable: bool,
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    name: &'static str,
    state: Mutex<State>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_placements(&self, placements: Vec<WindowPlacement>) {
        self.state().placements = placements;
    }

    pub fn set_lines(&self, lines: Vec<String>) {
        self.state().lines = lines;
    }

    pub fn lines(&self) -> Vec<String> {
        self.state().lines.clone()
    }

    /// Every call sleeps this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// `(cols, rows)` of every resize request received, oldest first.
    pub fn resize_requests(&self) -> Vec<(usize, usize)> {
        self.state().resize_requests.clone()
    }

    fn enter(&self, call: &'static str) -> Result<(), EngineError> {
        let (latency, unreachable) = {
            let s = self.state();
            (s.latency, s.unreachable)
        };
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        if unreachable {
            return Err(EngineError::Disconnected(call));
        }
        Ok(())
    }
}

impl EditorEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn window_placements(&self) -> Result<Vec<WindowPlacement>, EngineError> {
        self.enter("window_placements")?;
        Ok(self.state().placements.clone())
    }

    fn try_resize(&self, cols: usize, rows: usize) -> Result<(), EngineError> {
        self.enter("try_resize")?;
        self.state().resize_requests.push((cols, rows));
        Ok(())
    }

    fn buffer_lines(&self) -> Result<Vec<String>, EngineError> {
        self.enter("buffer_lines")?;
        Ok(self.state().lines.clone())
    }

    fn set_buffer_lines(&self, lines: &[String]) -> Result<(), EngineError> {
        self.enter("set_buffer_lines")?;
        self.state().lines = lines.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_resizes_in_order() {
        let e = MemoryEngine::new();
        e.try_resize(80, 24).unwrap();
        e.try_resize(100, 30).unwrap();
        assert_eq!(e.resize_requests(), vec![(80, 24), (100, 30)]);
    }

    #[test]
    fn unreachable_fails_every_call() {
        let e = MemoryEngine::new();
        e.set_unreachable(true);
        assert_eq!(
            e.window_placements(),
            Err(EngineError::Disconnected("window_placements"))
        );
        assert!(e.set_buffer_lines(&["x".into()]).is_err());
        assert!(e.lines().is_empty());
    }

    #[test]
    fn buffer_lines_round_trip() {
        let e = MemoryEngine::named("secondary");
        e.set_buffer_lines(&["a".into(), "b".into()]).unwrap();
        assert_eq!(e.buffer_lines().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(e.name(), "secondary");
    }
}
