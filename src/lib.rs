pub mod emitter;
pub mod error;
pub mod key;
pub mod value;
pub mod wait;

pub use emitter::{
    default_max_listeners, set_default_max_listeners, EventBus, ERROR_EVENT, NEW_LISTENER_EVENT,
    REMOVE_LISTENER_EVENT,
};
pub use error::{LeakWarning, UnhandledError, WaitError};
pub use key::{EventKey, EventToken};
pub use value::{listener, EventValue, Listener, ListenerFn, SharedError};
pub use wait::{wait_for, ListenerPair, WaitSource};
