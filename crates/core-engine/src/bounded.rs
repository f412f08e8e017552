//! Engine calls off the UI thread.
//!
//! Each call runs on its own short-lived worker thread and reports back over a
//! one-slot channel. The caller either waits at most a timeout, keeping the
//! [`PendingCall`] to pick up a late answer with [`PendingCall::try_take`], or
//! never waits and polls on later frames.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::{EditorEngine, EngineError};

#[derive(Debug)]
pub struct PendingCall<T> {
    call: &'static str,
    rx: Receiver<Result<T, EngineError>>,
}

impl<T> PendingCall<T> {
    pub fn call(&self) -> &'static str {
        self.call
    }

    /// Wait up to `timeout` for the answer.
    pub fn wait(&self, timeout: Duration) -> Result<T, EngineError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout {
                call: self.call,
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Disconnected(self.call)),
        }
    }

    /// Non-blocking poll: `None` while the worker is still running.
    pub fn try_take(&self) -> Option<Result<T, EngineError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(EngineError::Disconnected(self.call))),
        }
    }
}

/// Start `f` against `engine` on a worker thread.
pub fn spawn_call<E, T, F>(engine: &Arc<E>, call: &'static str, f: F) -> PendingCall<T>
where
    E: EditorEngine + ?Sized,
    T: Send + 'static,
    F: FnOnce(&E) -> Result<T, EngineError> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let engine = Arc::clone(engine);
    let spawned = std::thread::Builder::new()
        .name(format!("engine-{call}"))
        .spawn(move || {
            // Receiver may already be gone if the caller gave up; nothing to do then.
            let _ = tx.send(f(&engine));
        });
    if let Err(err) = spawned {
        // The closure (and its sender) was dropped, so the receiver reports
        // a disconnect to the caller.
        tracing::warn!(target: "engine", call, error = %err, "engine_worker_spawn_failed");
    }
    PendingCall { call, rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryEngine, WindowPlacement};

    #[test]
    fn fast_call_returns_answer() {
        let engine = Arc::new(MemoryEngine::new());
        engine.set_placements(vec![WindowPlacement::new(2, 0, 0, 10, 40)]);
        let got = spawn_call(&engine, "placements", |e| e.window_placements())
            .wait(Duration::from_secs(2))
            .unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn slow_call_times_out_then_late_answer_is_available() {
        let engine = Arc::new(MemoryEngine::new());
        engine.set_latency(Duration::from_millis(60));
        let pending = spawn_call(&engine, "placements", |e| e.window_placements());
        let err = pending.wait(Duration::from_millis(1)).unwrap_err();
        assert!(err.is_timeout());
        // The worker eventually answers; a blocking wait picks it up.
        assert!(pending.wait(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn dyn_engine_accepted() {
        let engine: Arc<dyn EditorEngine> = Arc::new(MemoryEngine::new());
        let res = spawn_call(&engine, "resize", |e| e.try_resize(80, 24)).wait(Duration::from_secs(2));
        assert!(res.is_ok());
    }

    #[test]
    fn try_take_is_empty_until_worker_answers() {
        let engine = Arc::new(MemoryEngine::new());
        engine.set_latency(Duration::from_millis(200));
        let pending = spawn_call(&engine, "resize", |e| e.try_resize(100, 30));
        assert!(pending.try_take().is_none());
        assert!(pending.wait(Duration::from_secs(2)).is_ok());
        assert_eq!(engine.resize_requests(), vec![(100, 30)]);
    }
}
