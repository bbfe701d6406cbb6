//! Request-scoped values attached to log events.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Key of the trace identifier.
pub const TRACE_ID: &str = "trace_id";

/// Key of the user identifier.
pub const USER_ID: &str = "user_id";

/// Key of the request identifier.
pub const REQUEST_ID: &str = "request_id";

/// Keys copied onto events by [`crate::Logger::with_context`].
pub const CONTEXT_KEYS: [&str; 3] = [TRACE_ID, USER_ID, REQUEST_ID];

/// Type-erased values carried alongside a request or operation.
///
/// Values of any type can be stored; the logger only picks up string values
/// (`String` or `&'static str`) under [`CONTEXT_KEYS`]. Anything else under
/// those keys reads as absent.
#[derive(Clone, Default)]
pub struct LogContext {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(key, value);
        self
    }

    /// Typed lookup.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        let value: &(dyn Any + Send + Sync) = self.values.get(key)?.as_ref();
        value.downcast_ref::<T>()
    }

    /// String lookup, accepting `String` and `&'static str` values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get::<String>(key)
            .map(String::as_str)
            .or_else(|| self.get::<&'static str>(key).copied())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("LogContext").field("keys", &keys).finish()
    }
}
