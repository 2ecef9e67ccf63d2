//! Event keys — the identities listeners are grouped under.
//!
//! A key is either a plain string name or an [`EventToken`], a process-unique
//! opaque identity for callers that want collision-proof private channels.
//! Tokens compare and hash by their numeric identity only; the optional label
//! exists purely for diagnostics.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global token counter. Never reused within a process.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// A process-unique opaque event key.
#[derive(Debug, Clone)]
pub struct EventToken {
    id: u64,
    label: Option<Arc<str>>,
}

impl EventToken {
    /// Allocate a fresh token, distinct from every other token in the process.
    pub fn new() -> Self {
        Self {
            id: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            label: None,
        }
    }

    /// Allocate a fresh token carrying a diagnostic label.
    ///
    /// Two tokens with the same label are still distinct keys.
    pub fn labeled(label: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            label: Some(label.into()),
        }
    }

    /// The diagnostic label, if one was given.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Default for EventToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EventToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventToken {}

impl Hash for EventToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EventToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "Token({label})"),
            None => write!(f, "Token(#{})", self.id),
        }
    }
}

/// An event key: a string name or a process-unique token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Name(String),
    Token(EventToken),
}

impl EventKey {
    /// The string name, if this is a named key.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Token(_) => None,
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<EventToken> for EventKey {
    fn from(token: EventToken) -> Self {
        Self::Token(token)
    }
}

impl From<&EventToken> for EventKey {
    fn from(token: &EventToken) -> Self {
        Self::Token(token.clone())
    }
}

impl From<&EventKey> for EventKey {
    fn from(key: &EventKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Token(token) => token.fmt(f),
        }
    }
}
