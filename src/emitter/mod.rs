//! Emitter — the synchronous pub/sub core.
//!
//! # Overview
//!
//! [`EventBus`] owns a registry of event keys to ordered listener lists and
//! dispatches emissions synchronously, in-stack, from a snapshot of the list
//! (see [`bus`] for the reentrancy rules). `newListener` / `removeListener`
//! meta-events observe registry mutations; crossing the max-listeners
//! threshold logs a leak warning once per crossing.
//!
//! # Modules
//!
//! - [`bus`] — [`EventBus`], the reserved key names, and the process-wide
//!   default max-listeners accessors.
//! - `entry` — per-key listener storage (internal).

pub mod bus;
mod entry;

pub use bus::{
    default_max_listeners, set_default_max_listeners, EventBus, ERROR_EVENT, NEW_LISTENER_EVENT,
    REMOVE_LISTENER_EVENT,
};
