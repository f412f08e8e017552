//! Fire-and-forget buffer sync from the primary engine to the minimap engine.
//!
//! At most one sync is in flight. A request while one is running is skipped;
//! a sync older than the timeout is abandoned (its worker finishes on its own)
//! and a new one starts. Nothing here blocks the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use core_engine::{EditorEngine, EngineError, PendingCall, spawn_call};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStart {
    Started,
    /// A previous sync is still running.
    Busy,
}

#[derive(Debug)]
pub struct SyncGate {
    in_flight: Option<(PendingCall<usize>, Instant)>,
    timeout: Duration,
    completed: u64,
    abandoned: u64,
}

impl SyncGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            in_flight: None,
            timeout,
            completed: 0,
            abandoned: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    /// Settle the in-flight sync if it finished or expired. Never blocks.
    pub fn poll(&mut self) {
        let Some((pending, started)) = self.in_flight.as_ref() else {
            return;
        };
        match pending.try_take() {
            Some(Ok(lines)) => {
                tracing::debug!(target: "minimap", lines, "buffer_sync_done");
                self.completed += 1;
                self.in_flight = None;
            }
            Some(Err(err)) => {
                tracing::warn!(target: "minimap", error = %err, "buffer_sync_failed");
                self.in_flight = None;
            }
            None if started.elapsed() >= self.timeout => {
                tracing::warn!(
                    target: "minimap",
                    timeout_ms = self.timeout.as_millis() as u64,
                    "buffer_sync_timeout"
                );
                self.abandoned += 1;
                self.in_flight = None;
            }
            None => {}
        }
    }

    /// Copy the primary's buffer lines into the secondary engine, unless a
    /// sync is already running.
    pub fn request(
        &mut self,
        primary: &Arc<dyn EditorEngine>,
        secondary: &Arc<dyn EditorEngine>,
    ) -> SyncStart {
        self.poll();
        if self.in_flight.is_some() {
            tracing::trace!(target: "minimap", "buffer_sync_skipped");
            return SyncStart::Busy;
        }
        let secondary = Arc::clone(secondary);
        let pending = spawn_call(primary, "minimap_sync", move |p| -> Result<usize, EngineError> {
            let lines = p.buffer_lines()?;
            if lines.is_empty() {
                return Ok(0);
            }
            secondary.set_buffer_lines(&lines)?;
            Ok(lines.len())
        });
        self.in_flight = Some((pending, Instant::now()));
        SyncStart::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use core_engine::MemoryEngine;

    fn pair() -> (Arc<MemoryEngine>, Arc<MemoryEngine>) {
        (Arc::new(MemoryEngine::named("primary")), Arc::new(MemoryEngine::named("minimap")))
    }

    fn wait_idle(gate: &mut SyncGate) {
        for _ in 0..200 {
            gate.poll();
            if !gate.is_busy() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn copies_lines_to_secondary() {
        let (p, s) = pair();
        p.set_lines(vec!["fn main() {}".into(), "".into()]);
        let (pd, sd): (Arc<dyn EditorEngine>, Arc<dyn EditorEngine>) = (p.clone(), s.clone());
        let mut gate = SyncGate::new(Duration::from_secs(2));
        assert_eq!(gate.request(&pd, &sd), SyncStart::Started);
        wait_idle(&mut gate);
        assert_eq!(gate.completed(), 1);
        assert_eq!(s.lines(), vec!["fn main() {}".to_string(), String::new()]);
    }

    #[test]
    fn busy_while_in_flight_then_abandoned_after_timeout() {
        let (p, s) = pair();
        p.set_lines(vec!["x".into()]);
        s.set_latency(Duration::from_millis(150));
        let (pd, sd): (Arc<dyn EditorEngine>, Arc<dyn EditorEngine>) = (p.clone(), s.clone());
        let mut gate = SyncGate::new(Duration::from_millis(30));
        assert_eq!(gate.request(&pd, &sd), SyncStart::Started);
        assert_eq!(gate.request(&pd, &sd), SyncStart::Busy);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(gate.request(&pd, &sd), SyncStart::Started);
        assert_eq!(gate.abandoned(), 1);
    }

    #[test]
    fn empty_primary_leaves_secondary_untouched() {
        let (p, s) = pair();
        s.set_lines(vec!["old".into()]);
        let (pd, sd): (Arc<dyn EditorEngine>, Arc<dyn EditorEngine>) = (p.clone(), s.clone());
        let mut gate = SyncGate::new(Duration::from_secs(2));
        gate.request(&pd, &sd);
        wait_idle(&mut gate);
        assert_eq!(s.lines(), vec!["old".to_string()]);
    }
}
