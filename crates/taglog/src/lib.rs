//! Process-wide tagged structured logging.
//!
//! A thin facade over `tracing`: one logger per process, bound to a tag and a
//! minimum severity, writing one JSON object per line to stdout.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use taglog::{LogContext, TRACE_ID};
//!
//! taglog::init("info", "billing");
//!
//! let log = taglog::get();
//! log.structured_error("charge_failed", &json!({ "invoice": 42 }));
//!
//! let ctx = LogContext::new().with(TRACE_ID, "abc");
//! log.with_context(&ctx).msg("charge retried");
//! ```
//!
//! # Records
//!
//! ```text
//! {"timestamp":"...","level":"error","tag":"billing","message":"structured log","event":"charge_failed","payload":{"invoice":42}}
//! ```
//!
//! Optional keys: `event`, `payload`, `payload_error`, `error`, `stack`,
//! `trace_id`, `user_id`, `request_id`.
//!
//! Level names are matched leniently everywhere: anything other than
//! `debug`, `info`, `warn`, `error` or `fatal` means `info`. Logging never
//! returns errors; the only hard failure is [`get`] before [`init`].

pub mod config;
pub mod context;
mod global;
pub mod logger;

pub use common::{RecordLayer, Severity, Threshold};
pub use config::Config;
pub use context::{LogContext, REQUEST_ID, TRACE_ID, USER_ID};
pub use global::{get, init, init_from_config, try_get};
pub use logger::{Logger, PendingEvent, STRUCTURED_MESSAGE};
