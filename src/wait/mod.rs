//! Promise-style one-shot wait over `once` semantics.
//!
//! [`wait_for`] resolves with the emitted arguments when the awaited key
//! fires, or rejects with [`WaitError::Event`] when an `"error"` event fires
//! first. Whichever listener fires first wins and deregisters the loser, so
//! no dangling registration can spuriously complete a later wait.
//!
//! Listeners are installed before `wait_for` returns, so emitting after the
//! call but before the first poll of the future still completes the wait.
//! The installed listeners run synchronously inside `emit` and hand the
//! outcome to the future through a oneshot channel; awaiting that channel is
//! the only async seam in the crate.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::emitter::bus::{EventBus, ERROR_EVENT};
use crate::error::WaitError;
use crate::key::EventKey;
use crate::value::{EventValue, Listener, ListenerFn};

type Outcome = Result<Vec<EventValue>, WaitError>;
type OutcomeSlot = Arc<Mutex<Option<oneshot::Sender<Outcome>>>>;

/// Generic add/remove-listener capability for sources that are not an
/// [`EventBus`] (`addEventListener`-style targets).
///
/// [`wait_for`] adapts this pair to single-shot semantics for the success
/// path; no auxiliary error listener is installed.
pub trait ListenerPair: Send + Sync {
    fn add_event_listener(&self, key: &EventKey, listener: Listener);
    fn remove_event_listener(&self, key: &EventKey, listener: &Listener);
}

/// What to wait on; the capability variant is selected once, at call time.
pub enum WaitSource {
    /// Native bus capability: `once` registration plus the error channel.
    Bus(EventBus),
    /// Reduced capability: a generic listener pair, success path only.
    Pair(Arc<dyn ListenerPair>),
}

impl From<&EventBus> for WaitSource {
    fn from(bus: &EventBus) -> Self {
        Self::Bus(bus.clone())
    }
}

impl From<EventBus> for WaitSource {
    fn from(bus: EventBus) -> Self {
        Self::Bus(bus)
    }
}

impl From<Arc<dyn ListenerPair>> for WaitSource {
    fn from(pair: Arc<dyn ListenerPair>) -> Self {
        Self::Pair(pair)
    }
}

impl<P: ListenerPair + 'static> From<Arc<P>> for WaitSource {
    fn from(pair: Arc<P>) -> Self {
        Self::Pair(pair)
    }
}

/// Wait for one emission of `key`.
///
/// Resolves with the emitted arguments, or rejects with
/// [`WaitError::Event`] if an `"error"` event fires first (unless `key` is
/// the error key itself, in which case its payload resolves the wait).
/// [`WaitError::SourceClosed`] reports a source dropped before either event
/// fired.
///
/// There is no explicit cancel: a caller abandoning the wait removes the
/// installed listeners itself.
pub fn wait_for(
    source: impl Into<WaitSource>,
    key: impl Into<EventKey>,
) -> Pin<Box<dyn Future<Output = Result<Vec<EventValue>, WaitError>> + Send>> {
    let key = key.into();
    let (sender, receiver) = oneshot::channel::<Outcome>();
    let outcome: OutcomeSlot = Arc::new(Mutex::new(Some(sender)));

    match source.into() {
        WaitSource::Bus(bus) => wait_on_bus(&bus, key, outcome),
        WaitSource::Pair(pair) => wait_on_pair(pair, key, outcome),
    }

    Box::pin(async move { receiver.await.map_err(|_| WaitError::SourceClosed)? })
}

fn wait_on_bus(bus: &EventBus, key: EventKey, outcome: OutcomeSlot) {
    // The error listener does not exist yet when the success listener is
    // built; it reaches it through this slot, filled before registration.
    // Weak, because the two listeners would otherwise cycle through it.
    let error_listener_slot: Arc<OnceLock<Weak<ListenerFn>>> = Arc::new(OnceLock::new());

    let success: Listener = {
        let outcome = Arc::clone(&outcome);
        let bus = bus.downgrade();
        let error_listener_slot = Arc::clone(&error_listener_slot);
        Arc::new(move |args: &[EventValue]| {
            if let Some(sender) = outcome.lock().take() {
                let error_listener = error_listener_slot.get().and_then(Weak::upgrade);
                if let (Some(bus), Some(error_listener)) = (bus.upgrade(), error_listener) {
                    bus.remove_listener(ERROR_EVENT, &error_listener);
                }
                let _ = sender.send(Ok(args.to_vec()));
            }
        })
    };

    // Waiting on the error key itself resolves with its payload; no
    // auxiliary listener is needed.
    if key.as_name() != Some(ERROR_EVENT) {
        let error_listener: Listener = {
            let outcome = Arc::clone(&outcome);
            let bus = bus.downgrade();
            let key = key.clone();
            let success = Arc::clone(&success);
            Arc::new(move |args: &[EventValue]| {
                if let Some(sender) = outcome.lock().take() {
                    if let Some(bus) = bus.upgrade() {
                        bus.remove_listener(key.clone(), &success);
                    }
                    let _ = sender.send(Err(WaitError::Event(args.first().cloned())));
                }
            })
        };
        let _ = error_listener_slot.set(Arc::downgrade(&error_listener));
        bus.once(key, success);
        bus.once(ERROR_EVENT, error_listener);
    } else {
        bus.once(key, success);
    }
}

fn wait_on_pair(pair: Arc<dyn ListenerPair>, key: EventKey, outcome: OutcomeSlot) {
    let identity: Arc<OnceLock<Weak<ListenerFn>>> = Arc::new(OnceLock::new());

    let wrapper: Listener = {
        let pair = Arc::downgrade(&pair);
        let key = key.clone();
        let identity = Arc::clone(&identity);
        Arc::new(move |args: &[EventValue]| {
            // Single-shot adapter: deregister before delivering.
            let me = identity.get().and_then(Weak::upgrade);
            if let (Some(pair), Some(me)) = (pair.upgrade(), me) {
                pair.remove_event_listener(&key, &me);
            }
            if let Some(sender) = outcome.lock().take() {
                let _ = sender.send(Ok(args.to_vec()));
            }
        })
    };
    let _ = identity.set(Arc::downgrade(&wrapper));

    pair.add_event_listener(&key, wrapper);
}
