//! Event argument values.
//!
//! Emissions carry a slice of [`EventValue`]s. Ordinary events carry
//! [`Json`](EventValue::Json) data; the `"error"` key carries
//! [`Error`](EventValue::Error) payloads; the `newListener` /
//! `removeListener` meta-events carry [`Key`](EventValue::Key) and
//! [`Callback`](EventValue::Callback) values describing the registry
//! mutation.
//!
//! `Error` and `Callback` values compare by `Arc` pointer identity, `Json`
//! and `Key` structurally.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::key::EventKey;

/// Closure type for event listeners.
pub type ListenerFn = dyn Fn(&[EventValue]) + Send + Sync;

/// A registered callback. `Arc` pointer identity is listener identity:
/// keep a clone of the `Arc` you registered to remove it later.
pub type Listener = Arc<ListenerFn>;

/// Wrap a closure as a [`Listener`].
pub fn listener(f: impl Fn(&[EventValue]) + Send + Sync + 'static) -> Listener {
    Arc::new(f)
}

/// A shared error payload, as emitted on the `"error"` key.
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// One emitted event argument.
#[derive(Clone)]
pub enum EventValue {
    /// Arbitrary structured data.
    Json(Value),
    /// An error payload.
    Error(SharedError),
    /// A listener value (meta-events pass the affected callback).
    Callback(Listener),
    /// An event key value (meta-events pass the affected key).
    Key(EventKey),
}

impl EventValue {
    /// Wrap an error as an event argument.
    pub fn error(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Error(Arc::new(err))
    }

    /// The JSON payload, if this is a `Json` value.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The error payload, if this is an `Error` value.
    pub fn as_error(&self) -> Option<&SharedError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// The callback, if this is a `Callback` value.
    pub fn as_callback(&self) -> Option<&Listener> {
        match self {
            Self::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    /// The key, if this is a `Key` value.
    pub fn as_key(&self) -> Option<&EventKey> {
        match self {
            Self::Key(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Debug for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
        }
    }
}

impl PartialEq for EventValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Key(a), Self::Key(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => Arc::ptr_eq(a, b),
            (Self::Callback(a), Self::Callback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Value> for EventValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<u64> for EventValue {
    fn from(value: u64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<bool> for EventValue {
    fn from(value: bool) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<EventKey> for EventValue {
    fn from(key: EventKey) -> Self {
        Self::Key(key)
    }
}
