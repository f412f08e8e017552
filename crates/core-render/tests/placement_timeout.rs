use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use core_engine::{MemoryEngine, WindowPlacement};
use core_protocol::RawBatch;
use core_render::{Compositor, CompositorOptions, FixedMetrics, PaintCommand, RecordingBackend};
use serde_json::json;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

fn first_text_x(c: &Compositor<RecordingBackend>) -> Option<f32> {
    c.backend().commands().iter().find_map(|cmd| match cmd {
        PaintCommand::Text { x, .. } => Some(*x),
        _ => None,
    })
}

#[test]
fn slow_engine_reuses_last_known_placements_then_adopts_late_answer() {
    let engine = Arc::new(MemoryEngine::new());
    engine.set_placements(vec![WindowPlacement::new(2, 0, 0, 2, 5)]);
    let options = CompositorOptions {
        placement_timeout: Duration::from_millis(50),
        draw_borders: false,
        ..CompositorOptions::default()
    };
    let mut c = Compositor::new(
        RecordingBackend::new(),
        Box::new(FixedMetrics::new(10.0, 20.0, 15.0)),
        engine.clone(),
        options,
    );
    c.apply_batch(
        &RawBatch::from_value(json!([
            ["grid_resize", [1, 20, 5]],
            ["grid_resize", [2, 5, 2]]
        ]))
        .unwrap(),
    );
    assert!(c.placements().get(2).is_some());

    // The window moves, but the engine now answers too slowly.
    engine.set_placements(vec![WindowPlacement::new(2, 0, 8, 2, 5)]);
    engine.set_latency(Duration::from_millis(300));
    c.backend_mut().clear();

    let buf = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter { inner: buf.clone() })
        .finish();
    with_default(subscriber, || {
        c.apply_batch(
            &RawBatch::from_value(json!([
                ["grid_resize", [2, 5, 2]],
                ["grid_line", [2, 0, 0, [["w", 0]]]]
            ]))
            .unwrap(),
        );
    });
    let logs = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("render.placement"), "logs: {logs}");
    assert!(logs.contains("placement_timeout"), "logs: {logs}");
    assert!(c.placements().is_pending());
    // Painted at the last-known column.
    assert_eq!(first_text_x(&c), Some(0.0));
    assert_eq!(c.metrics().snapshot().placement_timeouts, 1);

    // The late answer is picked up by the next cycle without a new query.
    std::thread::sleep(Duration::from_millis(600));
    c.backend_mut().clear();
    let report = c.paint_cycle();
    assert!(report.is_some());
    assert!(!c.placements().is_pending());
    assert_eq!(first_text_x(&c), Some(80.0));
}
