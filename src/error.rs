use std::fmt;

use thiserror::Error;

use crate::key::EventKey;
use crate::value::{EventValue, SharedError};

// ---------------------------------------------------------------------------
// UnhandledError
// ---------------------------------------------------------------------------

/// Fatal payload raised by [`EventBus::emit`](crate::EventBus::emit) when an
/// `"error"` event fires with no listeners registered for it.
///
/// Delivered via `std::panic::panic_any`, so a host panic hook can downcast
/// the panic payload back to this type and recover the emitted context.
#[derive(Debug)]
pub struct UnhandledError {
    /// The emitted payload, when it was not itself an error value.
    pub context: Option<EventValue>,
    cause: Option<SharedError>,
}

impl UnhandledError {
    /// An `"error"` emission whose first argument was already an error value.
    pub fn from_cause(cause: SharedError) -> Self {
        Self {
            context: None,
            cause: Some(cause),
        }
    }

    /// An `"error"` emission carrying a non-error (or no) first argument.
    pub fn with_context(context: Option<EventValue>) -> Self {
        Self {
            context,
            cause: None,
        }
    }

    /// The emitted error value, when the first argument was one.
    pub fn cause(&self) -> Option<&SharedError> {
        self.cause.as_ref()
    }
}

impl fmt::Display for UnhandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unhandled \"error\" event")?;
        if let Some(cause) = &self.cause {
            return write!(f, " ({cause})");
        }
        match &self.context {
            Some(EventValue::Json(value)) => write!(f, " ({value})"),
            Some(other) => write!(f, " ({other:?})"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for UnhandledError {}

// ---------------------------------------------------------------------------
// LeakWarning
// ---------------------------------------------------------------------------

/// Advisory warning issued when a key's listener count first exceeds the
/// configured max-listeners limit. Surfaced through the `log` facade, never
/// raised.
#[derive(Debug, Clone, Error)]
#[error(
    "Possible EventBus memory leak detected. {count} \"{key}\" listeners added \
     (limit {limit}). Use set_max_listeners() to increase the limit"
)]
pub struct LeakWarning {
    /// The key whose listener list crossed the threshold.
    pub key: EventKey,
    /// Listener count at the moment of the crossing.
    pub count: usize,
    /// The effective limit that was exceeded.
    pub limit: usize,
}

// ---------------------------------------------------------------------------
// WaitError
// ---------------------------------------------------------------------------

/// Failure arm of [`wait_for`](crate::wait_for).
#[derive(Debug, Error)]
pub enum WaitError {
    /// An `"error"` event fired before the awaited event.
    #[error("\"error\" event emitted while waiting{}", event_detail(.0))]
    Event(Option<EventValue>),

    /// The event source went away before either event fired.
    #[error("event source dropped before the event fired")]
    SourceClosed,
}

fn event_detail(payload: &Option<EventValue>) -> String {
    match payload {
        Some(EventValue::Error(err)) => format!(": {err}"),
        Some(EventValue::Json(value)) => format!(": {value}"),
        Some(other) => format!(": {other:?}"),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
