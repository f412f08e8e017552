//! Runtime events and channel helpers for nvgrid.
//!
//! Everything the main loop reacts to arrives as an [`Event`] on one bounded
//! `tokio::sync::mpsc` channel: redraw batches from the engine transport,
//! window-system input, periodic ticks and shutdown.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use core_protocol::{GridId, RawBatch};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// One bounded channel, one consumer. The transport thread enqueues with `blocking_send`, parking
// until space is available instead of dropping batches: a dropped redraw batch would leave the
// grids permanently out of sync with the engine. Each slot holds a whole batch, so the capacity is
// small compared to a per-keystroke queue.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 256;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static CHANNEL_BLOCKING_SENDS: AtomicU64 = AtomicU64::new(0);
pub static REDRAW_BATCHES: AtomicU64 = AtomicU64::new(0);
pub static MINIMAP_BATCHES: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// Redraw notification for the primary view.
    Redraw(RawBatch),
    /// Redraw notification from the minimap's secondary engine.
    MinimapRedraw(RawBatch),
    Input(InputEvent),
    /// Animation frame.
    Tick,
    Shutdown,
}

/// Window-system input the renderer cares about. Key contents go straight to
/// the engine; only auto-repeat state matters here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { repeat: bool },
    Scroll { grid: GridId, phase: ScrollPhase },
    Resize { width_px: f32, height_px: f32 },
    FocusGained,
    FocusLost,
}

/// Phase of a bulk scroll gesture on one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollPhase {
    Began,
    Changed,
    Ended,
}

impl ScrollPhase {
    /// Whether cursor animation should stay suppressed on the scrolled grid.
    pub fn is_active(self) -> bool {
        !matches!(self, ScrollPhase::Ended)
    }
}

/// Producer handle for threads outside the runtime (the engine transport).
#[derive(Debug, Clone)]
pub struct TransportSink {
    tx: Sender<Event>,
}

impl TransportSink {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx }
    }

    /// Enqueue a primary redraw batch, parking while the channel is full.
    /// Must not be called from inside the async runtime.
    pub fn send_redraw(&self, batch: RawBatch) -> anyhow::Result<()> {
        self.send(Event::Redraw(batch))?;
        REDRAW_BATCHES.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn send_minimap(&self, batch: RawBatch) -> anyhow::Result<()> {
        self.send(Event::MinimapRedraw(batch))?;
        MINIMAP_BATCHES.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn send(&self, event: Event) -> anyhow::Result<()> {
        match self.tx.blocking_send(event) {
            Ok(()) => {
                CHANNEL_BLOCKING_SENDS.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "runtime.events", "transport_send_closed");
                Err(err).context("event channel closed")
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Each source owns its task lifecycle and must stop once a send fails (consumer dropped). The
// bounded channel provides flow control.

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors stop when
    /// `tx.send(..).await` returns Err and never busy-loop.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; during shutdown the caller drops its last `Sender` before awaiting the
    /// handles so the sources observe the closed channel.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Emits `Event::Tick` every interval; drives cursor animation frames.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockFocusSource;

    impl AsyncEventSource for MockFocusSource {
        fn name(&self) -> &'static str {
            "mock_focus"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(Event::Input(InputEvent::FocusGained)).await;
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockFocusSource);
        reg.register(TickEventSource::new(Duration::from_millis(10)));
        assert_eq!(reg.len(), 2);
        let handles = reg.spawn_all(&tx);
        assert!(reg.is_empty());

        let mut got_focus = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) && (!got_focus || !got_tick) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(5), rx.recv()).await {
                match ev {
                    Event::Input(InputEvent::FocusGained) => got_focus = true,
                    Event::Tick => got_tick = true,
                    _ => {}
                }
            }
        }
        assert!(got_focus, "expected mock source to emit focus");
        assert!(got_tick, "expected tick source to emit tick events");

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(20), handle).await;
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn transport_sink_preserves_batch_order() {
        let (tx, mut rx) = mpsc::channel::<Event>(2);
        let sink = TransportSink::new(tx);
        let producer = std::thread::spawn(move || {
            for n in 0..5u64 {
                let batch = RawBatch::from_value(serde_json::json!([["grid_resize", [1, n, 1]]]))
                    .unwrap();
                sink.send_redraw(batch).unwrap();
            }
        });

        let mut widths = Vec::new();
        while widths.len() < 5 {
            match rx.recv().await {
                Some(Event::Redraw(batch)) => {
                    widths.push(batch.events[0].invocations[0][1].as_u64().unwrap());
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        producer.join().unwrap();
        assert_eq!(widths, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn transport_sink_reports_closed_channel() {
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(rx);
        let before = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed);
        let sink = TransportSink::new(tx);
        let err = std::thread::spawn(move || sink.send(Event::Shutdown))
            .join()
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("event channel closed"));
        assert!(CHANNEL_SEND_FAILURES.load(Ordering::Relaxed) > before);
    }

    #[test]
    fn scroll_phase_activity() {
        assert!(ScrollPhase::Began.is_active());
        assert!(ScrollPhase::Changed.is_active());
        assert!(!ScrollPhase::Ended.is_active());
    }
}
