//! Shared helpers for taglog integration tests

use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use taglog::{Logger, Severity, Threshold};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// In-memory sink handed to the record layer
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
    }

    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("record is not JSON"))
            .collect()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a logger tagged `tag` at threshold `min`, returning the
/// records it wrote. Uses a thread-scoped subscriber and a private
/// threshold, so tests don't interfere with each other.
pub fn capture<F>(min: Severity, tag: &str, f: F) -> Vec<Value>
where
    F: FnOnce(&Logger),
{
    capture_sink(min, tag, f).records()
}

/// Like [`capture`], returning the raw output lines
pub fn capture_lines<F>(min: Severity, tag: &str, f: F) -> Vec<String>
where
    F: FnOnce(&Logger),
{
    capture_sink(min, tag, f).lines()
}

fn capture_sink<F>(min: Severity, tag: &str, f: F) -> Capture
where
    F: FnOnce(&Logger),
{
    let sink = Capture::default();
    let threshold = Threshold::new(min);
    let layer = taglog::RecordLayer::new(threshold.clone()).with_writer(sink.clone());
    let subscriber = tracing_subscriber::registry().with(layer);

    let logger = Logger::new(tag, threshold);
    tracing::subscriber::with_default(subscriber, || f(&logger));
    sink
}

/// Drop the timestamp so records written a moment apart compare equal
pub fn without_timestamp(mut record: Value) -> Value {
    if let Some(object) = record.as_object_mut() {
        object.remove("timestamp");
    }
    record
}
