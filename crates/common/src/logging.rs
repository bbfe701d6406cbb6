//! Logging backend for taglog components.
//!
//! Events emitted through `tracing` are rendered by [`RecordLayer`] as one
//! JSON object per line:
//!
//! ```text
//! {"timestamp":"2026-01-02T03:04:05Z","level":"error","tag":"svc","message":"structured log","event":"x","payload":{"a":1}}
//! ```
//!
//! Filtering is done against a shared [`Threshold`]. The process-wide one,
//! [`global_threshold`], applies to every event reaching the subscriber
//! registered by [`install`], not only to events emitted by the facade.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use serde_json::value::RawValue;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

use crate::severity::Severity;

/// Field carrying an explicit severity name. Consumed, never rendered.
pub const SEVERITY_FIELD: &str = "taglog.severity";

/// Field whose value is JSON text, embedded verbatim under [`PAYLOAD_KEY`].
pub const PAYLOAD_FIELD: &str = "taglog.payload";

/// Record key of the embedded payload.
pub const PAYLOAD_KEY: &str = "payload";

/// Field rendered right after the level.
pub const TAG_FIELD: &str = "tag";

/// Shared minimum severity.
///
/// Clones observe the same value, so a layer and the loggers feeding it can
/// hold their own handle.
#[derive(Debug, Clone)]
pub struct Threshold(Arc<AtomicU8>);

impl Threshold {
    pub fn new(min: Severity) -> Self {
        Self(Arc::new(AtomicU8::new(min as u8)))
    }

    pub fn get(&self) -> Severity {
        Severity::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, min: Severity) {
        self.0.store(min as u8, Ordering::Release);
    }

    /// Whether a record at `severity` passes.
    pub fn allows(&self, severity: Severity) -> bool {
        severity >= self.get()
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}

static GLOBAL_THRESHOLD: OnceLock<Threshold> = OnceLock::new();
static INSTALLED: OnceLock<bool> = OnceLock::new();

/// The process-wide threshold, `info` until changed.
pub fn global_threshold() -> &'static Threshold {
    GLOBAL_THRESHOLD.get_or_init(Threshold::default)
}

/// Install the process-wide subscriber: a registry with a [`RecordLayer`]
/// writing to stdout, filtered by [`global_threshold`].
///
/// Only the first call does any work. Returns `false` when another global
/// subscriber was already set by the host, in which case events go there.
pub fn install() -> bool {
    *INSTALLED.get_or_init(|| {
        let layer = RecordLayer::new(global_threshold().clone());
        match tracing_subscriber::registry().with(layer).try_init() {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "global subscriber already set, keeping it");
                false
            }
        }
    })
}

/// A tracing layer that writes events as JSON lines.
pub struct RecordLayer<W = fn() -> io::Stdout> {
    threshold: Threshold,
    make_writer: W,
}

impl RecordLayer {
    /// Create a layer writing to stdout.
    pub fn new(threshold: Threshold) -> Self {
        Self {
            threshold,
            make_writer: io::stdout,
        }
    }
}

impl<W> RecordLayer<W> {
    /// Replace the sink.
    pub fn with_writer<W2>(self, make_writer: W2) -> RecordLayer<W2>
    where
        W2: for<'writer> MakeWriter<'writer> + 'static,
    {
        RecordLayer {
            threshold: self.threshold,
            make_writer,
        }
    }

    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }
}

impl<W> fmt::Debug for RecordLayer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordLayer")
            .field("threshold", &self.threshold.get())
            .finish_non_exhaustive()
    }
}

impl<S, W> Layer<S> for RecordLayer<W>
where
    S: Subscriber,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    // The threshold can move at runtime, so interest must not be cached.
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        // Fatal records travel at ERROR, so the level check tops out there.
        let floor = self.threshold.get().min(Severity::Error);
        Severity::from(*metadata.level()) >= floor
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = RecordFields::default();
        event.record(&mut fields);

        let severity = fields
            .severity
            .unwrap_or_else(|| Severity::from(*event.metadata().level()));
        if !self.threshold.allows(severity) {
            return;
        }

        let Some(line) = fields.render(severity, Utc::now()) else {
            return;
        };
        let mut writer = self.make_writer.make_writer();
        let _ = writer.write_all(line.as_bytes());
    }
}

/// A rendered field: a plain JSON value, or JSON text embedded verbatim.
enum FieldValue {
    Json(Value),
    Raw(Box<RawValue>),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Json(value) => value.serialize(serializer),
            FieldValue::Raw(raw) => raw.serialize(serializer),
        }
    }
}

/// Ordered key/value pairs written as one JSON object.
struct Record(Vec<(String, FieldValue)>);

impl Record {
    fn push(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        if !self.0.iter().any(|(existing, _)| *existing == key) {
            self.0.push((key, value));
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Default)]
struct RecordFields {
    severity: Option<Severity>,
    tag: Option<FieldValue>,
    message: Option<String>,
    fields: Vec<(String, FieldValue)>,
}

impl RecordFields {
    fn record_value(&mut self, name: &str, value: FieldValue) {
        match name {
            "message" => {
                if self.message.is_none() {
                    self.message = Some(match value {
                        FieldValue::Json(Value::String(text)) => text,
                        FieldValue::Json(other) => other.to_string(),
                        FieldValue::Raw(raw) => raw.get().to_string(),
                    });
                }
            }
            TAG_FIELD => self.tag = Some(value),
            name => self.fields.push((name.to_string(), value)),
        }
    }

    fn record_json(&mut self, field: &Field, value: Value) {
        self.record_value(field.name(), FieldValue::Json(value));
    }

    fn render(self, severity: Severity, now: DateTime<Utc>) -> Option<String> {
        let mut record = Record(Vec::with_capacity(self.fields.len() + 4));
        record.push(
            "timestamp",
            FieldValue::Json(Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true))),
        );
        record.push(
            "level",
            FieldValue::Json(Value::String(severity.as_str().to_string())),
        );
        if let Some(tag) = self.tag {
            record.push(TAG_FIELD, tag);
        }
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            record.push("message", FieldValue::Json(Value::String(message)));
        }
        for (key, value) in self.fields {
            record.push(key, value);
        }

        let mut line = serde_json::to_string(&record).ok()?;
        line.push('\n');
        Some(line)
    }
}

impl Visit for RecordFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_json(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            SEVERITY_FIELD => self.severity = value.parse().ok(),
            PAYLOAD_FIELD => {
                // Embedded as written, so numbers keep their exact digits.
                let payload = match RawValue::from_string(value.to_string()) {
                    Ok(raw) => FieldValue::Raw(raw),
                    Err(_) => FieldValue::Json(Value::String(value.to_string())),
                };
                self.record_value(PAYLOAD_KEY, payload);
            }
            _ => self.record_json(field, Value::String(value.to_string())),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_json(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_json(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_json(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_json(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_json(field, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
    }

    impl Write for Capture {
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

    fn capture_lines<F: FnOnce()>(min: Severity, f: F) -> Vec<String> {
        let sink = Capture::default();
        let layer = RecordLayer::new(Threshold::new(min)).with_writer(sink.clone());
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        sink.lines()
    }

    fn capture<F: FnOnce()>(min: Severity, f: F) -> Vec<Value> {
        capture_lines(min, f)
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_threshold_shared_between_clones() {
        let threshold = Threshold::new(Severity::Warn);
        let other = threshold.clone();
        other.set(Severity::Debug);
        assert_eq!(threshold.get(), Severity::Debug);
        assert!(threshold.allows(Severity::Debug));
    }

    #[test]
    fn test_default_threshold_is_info() {
        let threshold = Threshold::default();
        assert!(!threshold.allows(Severity::Debug));
        assert!(threshold.allows(Severity::Info));
    }

    #[test]
    fn test_plain_events_are_filtered() {
        let records = capture(Severity::Warn, || {
            tracing::info!("dropped");
            tracing::warn!("kept");
            tracing::error!("also kept");
        });

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["level"], "warn");
        assert_eq!(records[0]["message"], "kept");
        assert_eq!(records[1]["level"], "error");
    }

    #[test]
    fn test_trace_counts_as_debug() {
        let records = capture(Severity::Debug, || tracing::trace!("fine grained"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "debug");
    }

    #[test]
    fn test_severity_field_overrides_level() {
        let records = capture(Severity::Fatal, || {
            tracing::error!(taglog.severity = "error", "not fatal enough");
            tracing::error!(taglog.severity = "fatal", tag = "svc", "going down");
        });

        assert_eq!(records.len(), 1);
        let record = records[0].as_object().unwrap();
        assert_eq!(record["level"], "fatal");
        assert_eq!(record["tag"], "svc");
        assert!(!record.contains_key(SEVERITY_FIELD));
    }

    #[test]
    fn test_plain_severity_field_is_just_a_field() {
        let records = capture(Severity::Debug, || {
            tracing::warn!(severity = "fatal", "caller field");
            tracing::info!(severity = "sev-2", "caller field");
        });

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["level"], "warn");
        assert_eq!(records[0]["severity"], "fatal");
        assert_eq!(records[1]["level"], "info");
        assert_eq!(records[1]["severity"], "sev-2");
    }

    #[test]
    fn test_plain_severity_field_does_not_promote() {
        let records = capture(Severity::Fatal, || {
            tracing::error!(severity = "fatal", "not a fatal record");
        });
        assert!(records.is_empty());
    }

    #[test]
    fn test_record_key_order_and_types() {
        let records = capture(Severity::Debug, || {
            tracing::info!(count = 3u64, ok = true, tag = "svc", "hello");
        });

        let record = records[0].as_object().unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, ["timestamp", "level", "tag", "message", "count", "ok"]);
        assert_eq!(record["count"], 3);
        assert_eq!(record["ok"], true);
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let records = capture(Severity::Info, || tracing::info!("now"));
        let stamp = records[0]["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok(), "bad timestamp {stamp}");
    }

    #[test]
    fn test_payload_embedded_as_json() {
        let records = capture(Severity::Info, || {
            tracing::info!(taglog.payload = r#"{"a":1,"b":[true]}"#, "structured");
            tracing::info!(taglog.payload = "not json", "plain");
            tracing::info!(payload = "[1]", "caller field");
        });

        assert_eq!(records[0]["payload"]["a"], 1);
        assert_eq!(records[0]["payload"]["b"][0], true);
        assert!(records[0].get(PAYLOAD_FIELD).is_none());
        assert_eq!(records[1]["payload"], "not json");
        assert_eq!(records[2]["payload"], "[1]");
    }

    #[test]
    fn test_payload_numbers_kept_verbatim() {
        let big = u128::MAX.to_string();
        let float = "1.0715660391465826e-75";
        let lines = capture_lines(Severity::Info, || {
            tracing::info!(taglog.payload = big.as_str(), "big");
            tracing::info!(taglog.payload = float, "float");
        });

        assert!(
            lines[0].ends_with(&format!(r#""payload":{big}}}"#)),
            "payload rewritten: {}",
            lines[0]
        );
        assert!(
            lines[1].ends_with(&format!(r#""payload":{float}}}"#)),
            "payload rewritten: {}",
            lines[1]
        );
    }

    #[test]
    fn test_empty_message_omitted() {
        let records = capture(Severity::Info, || tracing::info!(user_id = "u1", ""));
        let record = records[0].as_object().unwrap();
        assert!(!record.contains_key("message"));
        assert_eq!(record["user_id"], "u1");
    }

    #[test]
    fn test_fields_cannot_clobber_header() {
        let records = capture(Severity::Info, || tracing::info!(timestamp = "bogus", "hi"));
        assert_ne!(records[0]["timestamp"], "bogus");
    }
}
