//! Common utilities and types shared across taglog components.
//!
//! This crate is the logging backend: severities, the process-wide
//! threshold and the JSON record layer plugged into `tracing`.

pub mod error;
pub mod logging;
pub mod severity;

pub use error::{Error, Result};
pub use logging::{RecordLayer, Threshold, global_threshold, install};
pub use severity::{ParseSeverityError, Severity};
