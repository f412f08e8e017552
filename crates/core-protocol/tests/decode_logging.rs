use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use core_protocol::{RawBatch, RedrawEvent, decode_batch};
use serde_json::json;
use tracing::Level;
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

fn capture<F: FnOnce()>(level: Level, f: F) -> String {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter { inner: buf.clone() })
        .finish();
    with_default(subscriber, f);
    let out = buf.lock().unwrap().clone();
    String::from_utf8(out).unwrap()
}

#[test]
fn malformed_event_logged_and_rest_of_batch_applied() {
    let batch = RawBatch::from_value(json!([
        ["grid_resize", [1, 20, 5]],
        ["grid_cursor_goto", [1, "two", 3]],
        ["grid_line", [1, 0, 0, [["x"]]]],
    ]))
    .unwrap();

    let mut decoded = None;
    let log = capture(Level::WARN, || decoded = Some(decode_batch(&batch)));
    let decoded = decoded.unwrap();

    assert!(log.contains("WARN protocol.decode:"), "log was: {log}");
    assert!(log.contains("decode_error"));
    assert!(log.contains("grid_cursor_goto"));
    assert_eq!(decoded.errors, 1);
    assert_eq!(decoded.events.len(), 2);
    assert!(matches!(decoded.events[1], RedrawEvent::Line { .. }));
}

#[test]
fn unknown_event_logged_at_debug_only() {
    let batch = RawBatch::single("busy_start", vec![json!([])]);
    let warn_log = capture(Level::WARN, || {
        decode_batch(&batch);
    });
    assert!(warn_log.is_empty());

    let debug_log = capture(Level::DEBUG, || {
        decode_batch(&batch);
    });
    assert!(debug_log.contains("unknown_event"));
    assert!(debug_log.contains("busy_start"));
}

#[test]
fn cell_text_never_logged() {
    let batch = RawBatch::single("grid_line", vec![json!([1, 0, 0, [["secret", "oops"]]])]);
    let log = capture(Level::TRACE, || {
        let decoded = decode_batch(&batch);
        assert_eq!(decoded.errors, 1);
    });
    assert!(!log.contains("secret"));
}
