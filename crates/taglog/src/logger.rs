//! The tagged logger and its pending events.

use std::error::Error as StdError;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use common::{Severity, Threshold};
use serde::Serialize;

use crate::context::{LogContext, REQUEST_ID, TRACE_ID, USER_ID};

/// Message of every record written by the `structured_*` family.
pub const STRUCTURED_MESSAGE: &str = "structured log";

/// Optional fields of a record. `None` fields are left out.
#[derive(Default)]
struct Fields<'a> {
    event: Option<&'a str>,
    payload: Option<&'a str>,
    payload_error: Option<&'a str>,
    error: Option<&'a str>,
    stack: Option<&'a str>,
    trace_id: Option<&'a str>,
    user_id: Option<&'a str>,
    request_id: Option<&'a str>,
}

// tracing needs the level at the callsite, so each severity gets its own.
macro_rules! emit_at {
    ($severity:expr, $($rest:tt)+) => {
        match $severity {
            Severity::Debug => tracing::debug!($($rest)+),
            Severity::Info => tracing::info!($($rest)+),
            Severity::Warn => tracing::warn!($($rest)+),
            Severity::Error | Severity::Fatal => tracing::error!($($rest)+),
        }
    };
}

fn emit(tag: &str, severity: Severity, fields: &Fields<'_>, message: &dyn fmt::Display) {
    emit_at!(
        severity,
        taglog.severity = severity.as_str(),
        tag = tag,
        event = fields.event,
        taglog.payload = fields.payload,
        payload_error = fields.payload_error,
        error = fields.error,
        stack = fields.stack,
        trace_id = fields.trace_id,
        user_id = fields.user_id,
        request_id = fields.request_id,
        "{}",
        message
    );
}

/// Renders an error and its `source()` chain.
fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    if next.is_some() {
        out.push_str("\n\nCaused by:");
    }
    let mut depth = 0;
    while let Some(source) = next {
        let _ = write!(out, "\n    {depth}: {source}");
        depth += 1;
        next = source.source();
    }
    out
}

/// A logger bound to a tag.
///
/// Every record it writes carries `tag`. Records below the shared threshold
/// are dropped before any payload is serialized. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Logger {
    tag: Arc<str>,
    threshold: Threshold,
}

impl Logger {
    /// Create a logger filtered by `threshold`.
    ///
    /// For the process-wide instance use [`crate::init`], which binds the
    /// logger to [`common::global_threshold`].
    pub fn new(tag: impl Into<String>, threshold: Threshold) -> Self {
        Self {
            tag: Arc::from(tag.into()),
            threshold,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Current minimum severity.
    pub fn level(&self) -> Severity {
        self.threshold.get()
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.threshold.allows(severity)
    }

    /// Start an event at `severity`. Nothing is written until
    /// [`PendingEvent::msg`] or [`PendingEvent::send`].
    pub fn event(&self, severity: Severity) -> PendingEvent {
        PendingEvent {
            logger: self.clone(),
            severity,
            trace_id: None,
            user_id: None,
            request_id: None,
        }
    }

    /// Start an info event carrying the string-typed `trace_id`, `user_id`
    /// and `request_id` found in `ctx`.
    pub fn with_context(&self, ctx: &LogContext) -> PendingEvent {
        self.event(Severity::Info).context(ctx)
    }

    /// Write an error record with the error's message under `error` and the
    /// error with its causes under `stack`.
    pub fn with_error_stack(&self, err: &(dyn StdError + 'static), msg: &str) {
        if !self.enabled(Severity::Error) {
            return;
        }
        let message = err.to_string();
        let stack = render_chain(err);
        self.write_error(&message, &stack, msg);
    }

    /// Like [`with_error_stack`](Self::with_error_stack), with anyhow's
    /// report under `stack`. The report includes a backtrace when one was
    /// captured.
    pub fn with_anyhow_stack(&self, err: &anyhow::Error, msg: &str) {
        if !self.enabled(Severity::Error) {
            return;
        }
        let message = err.to_string();
        let stack = format!("{err:?}");
        self.write_error(&message, &stack, msg);
    }

    fn write_error(&self, error: &str, stack: &str, msg: &str) {
        let fields = Fields {
            error: Some(error),
            stack: Some(stack),
            ..Fields::default()
        };
        emit(&self.tag, Severity::Error, &fields, &msg);
    }

    /// Write `payload` as structured data under `payload`, next to `event`.
    ///
    /// `level` is mapped leniently: unknown names log at info.
    pub fn structured_log<T>(&self, level: &str, event: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        self.structured_log_at(Severity::lenient(level), event, payload);
    }

    pub fn structured_log_at<T>(&self, severity: Severity, event: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        if !self.enabled(severity) {
            return;
        }

        let (payload, payload_error) = match serde_json::to_string(payload) {
            Ok(json) => (Some(json), None),
            Err(err) => (None, Some(err.to_string())),
        };

        let fields = Fields {
            event: Some(event),
            payload: payload.as_deref(),
            payload_error: payload_error.as_deref(),
            ..Fields::default()
        };
        emit(&self.tag, severity, &fields, &STRUCTURED_MESSAGE);
    }

    pub fn structured_debug<T>(&self, event: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        self.structured_log("debug", event, payload);
    }

    pub fn structured_error<T>(&self, event: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        self.structured_log("error", event, payload);
    }
}

/// An event that has not been written yet.
///
/// Finishing consumes it, so an event is written at most once.
#[derive(Debug)]
#[must_use = "events are only written by `msg` or `send`"]
pub struct PendingEvent {
    logger: Logger,
    severity: Severity,
    trace_id: Option<String>,
    user_id: Option<String>,
    request_id: Option<String>,
}

impl PendingEvent {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Copy the string-typed context identifiers from `ctx`. Keys already
    /// set are overwritten only when `ctx` has a value for them.
    pub fn context(mut self, ctx: &LogContext) -> Self {
        if let Some(trace_id) = ctx.get_str(TRACE_ID) {
            self.trace_id = Some(trace_id.to_string());
        }
        if let Some(user_id) = ctx.get_str(USER_ID) {
            self.user_id = Some(user_id.to_string());
        }
        if let Some(request_id) = ctx.get_str(REQUEST_ID) {
            self.request_id = Some(request_id.to_string());
        }
        self
    }

    /// Write the event with `message`.
    pub fn msg(self, message: impl fmt::Display) {
        if !self.logger.enabled(self.severity) {
            return;
        }
        let fields = Fields {
            trace_id: self.trace_id.as_deref(),
            user_id: self.user_id.as_deref(),
            request_id: self.request_id.as_deref(),
            ..Fields::default()
        };
        emit(&self.logger.tag, self.severity, &fields, &message);
    }

    /// Write the event without a message.
    pub fn send(self) {
        self.msg("");
    }
}
