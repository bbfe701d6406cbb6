//! The process-wide logger.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwapOption;
use common::{Severity, logging};

use crate::config::Config;
use crate::logger::Logger;

static INSTANCE: LazyLock<ArcSwapOption<Logger>> = LazyLock::new(ArcSwapOption::empty);

/// Initialize (or replace) the process-wide logger.
///
/// `level` is mapped leniently, unknown names meaning `info`. The level
/// becomes the global threshold, so it also filters plain `tracing` events
/// from code that never calls [`get`]. Records are written to stdout as JSON
/// lines carrying `tag`; initializing writes nothing by itself.
///
/// Calling this again swaps in a new logger; handles obtained earlier keep
/// their old tag but see the new threshold.
pub fn init(level: impl AsRef<str>, tag: impl Into<String>) {
    let severity = Severity::lenient(level.as_ref());

    logging::install();
    let threshold = logging::global_threshold();
    threshold.set(severity);

    let logger = Logger::new(tag, threshold.clone());
    INSTANCE.store(Some(Arc::new(logger)));
}

/// Initialize from a loaded [`Config`].
pub fn init_from_config(config: &Config) {
    init(&config.level, config.tag.clone());
}

/// The process-wide logger.
///
/// # Panics
///
/// Panics if [`init`] has not been called.
pub fn get() -> Arc<Logger> {
    match INSTANCE.load_full() {
        Some(logger) => logger,
        None => panic!("logger not initialized"),
    }
}

/// The process-wide logger, or `None` before [`init`].
pub fn try_get() -> Option<Arc<Logger>> {
    INSTANCE.load_full()
}
