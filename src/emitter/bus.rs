//! EventBus — the synchronous emitter.
//!
//! Listener lists are dispatched from a snapshot taken under the registry
//! lock, with the lock released before any callback runs:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!
//! Panics inside a listener propagate to the `emit` caller; later snapshot
//! members are left uninvoked. There is no error isolation at this level.
//!
//! All methods take `&self` (interior mutability via `parking_lot::Mutex`),
//! so listeners can call `on()`/`off()`/`emit()` re-entrantly during
//! dispatch without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::error::{LeakWarning, UnhandledError};
use crate::key::EventKey;
use crate::value::{EventValue, Listener, ListenerFn};

use super::entry::{ListenerCell, ListenerEntry};

/// The key carrying crash-on-unhandled semantics: emitting it with no
/// listeners panics with an [`UnhandledError`] payload.
pub const ERROR_EVENT: &str = "error";

/// Meta-event fired *before* a listener is added, with `[Key, Callback]`
/// arguments naming the registration.
pub const NEW_LISTENER_EVENT: &str = "newListener";

/// Meta-event fired *after* a listener is removed, with `[Key, Callback]`
/// arguments naming the removal.
pub const REMOVE_LISTENER_EVENT: &str = "removeListener";

// ---------------------------------------------------------------------------
// Process-wide default max-listeners
// ---------------------------------------------------------------------------

static DEFAULT_MAX_LISTENERS: AtomicUsize = AtomicUsize::new(10);

/// The process-wide max-listeners fallback, read by buses without a
/// per-instance override. Initial value 10.
pub fn default_max_listeners() -> usize {
    DEFAULT_MAX_LISTENERS.load(Ordering::Relaxed)
}

/// Replace the process-wide max-listeners fallback. `0` disables the leak
/// warning for every bus without an override.
pub fn set_default_max_listeners(limit: usize) {
    DEFAULT_MAX_LISTENERS.store(limit, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Registry {
    entries: HashMap<EventKey, ListenerEntry>,
    /// Key insertion order, for `event_names()`.
    order: Vec<EventKey>,
    /// Distinct keys with at least one listener, maintained incrementally.
    active_count: usize,
    max_listeners: Option<usize>,
}

impl Registry {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            active_count: 0,
            max_listeners: None,
        }
    }

    fn effective_limit(&self) -> usize {
        self.max_listeners.unwrap_or_else(default_max_listeners)
    }

    fn has(&self, key: &EventKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a cell, creating the entry on first registration. Returns the
    /// leak warning to surface, if this registration crossed the threshold.
    fn insert_cell(
        &mut self,
        key: EventKey,
        cell: ListenerCell,
        prepend: bool,
    ) -> Option<LeakWarning> {
        let limit = self.effective_limit();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.insert(cell, prepend);
                let count = entry.len();
                if limit > 0 && count > limit && !entry.warned {
                    entry.warned = true;
                    return Some(LeakWarning { key, count, limit });
                }
                None
            }
            None => {
                self.order.push(key.clone());
                self.active_count += 1;
                self.entries.insert(key, ListenerEntry::new(cell));
                None
            }
        }
    }

    /// Remove the first cell matching `target`; deletes the key when the
    /// entry empties.
    fn remove_cell(&mut self, key: &EventKey, target: &Listener) -> Option<ListenerCell> {
        let entry = self.entries.get_mut(key)?;
        let removed = entry.remove_first(target)?;
        if entry.is_empty() {
            self.delete_key(key);
        }
        Some(removed)
    }

    fn delete_key(&mut self, key: &EventKey) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            self.active_count -= 1;
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.active_count = 0;
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Synchronous, in-process event bus.
///
/// `Clone` yields another handle to the same bus (the registry is shared);
/// this is how listeners that need to mutate the bus, and
/// [`wait_for`](crate::wait_for), get hold of it.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

/// Non-owning bus handle held by once wrappers, so a registered wrapper
/// never keeps a dropped bus alive.
pub(crate) struct WeakBus {
    registry: Weak<Mutex<Registry>>,
}

impl WeakBus {
    pub(crate) fn upgrade(&self) -> Option<EventBus> {
        self.registry.upgrade().map(|registry| EventBus { registry })
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakBus {
        WeakBus {
            registry: Arc::downgrade(&self.registry),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Append `listener` to the entry for `key`.
    ///
    /// Keep a clone of the `Arc` to remove the listener later; identity is
    /// the `Arc` allocation, not the closure's shape.
    pub fn on(&self, key: impl Into<EventKey>, listener: Listener) -> &Self {
        self.add(key.into(), ListenerCell::plain(listener), false);
        self
    }

    /// Alias for [`on`](Self::on).
    pub fn add_listener(&self, key: impl Into<EventKey>, listener: Listener) -> &Self {
        self.on(key, listener)
    }

    /// Insert `listener` at the front of the entry for `key`.
    pub fn prepend_listener(&self, key: impl Into<EventKey>, listener: Listener) -> &Self {
        self.add(key.into(), ListenerCell::plain(listener), true);
        self
    }

    /// Append a listener invoked at most once; it deregisters itself before
    /// its first invocation runs.
    pub fn once(&self, key: impl Into<EventKey>, listener: Listener) -> &Self {
        let key = key.into();
        let cell = self.once_cell(key.clone(), listener);
        self.add(key, cell, false);
        self
    }

    /// [`once`](Self::once) with front insertion.
    pub fn prepend_once_listener(&self, key: impl Into<EventKey>, listener: Listener) -> &Self {
        let key = key.into();
        let cell = self.once_cell(key.clone(), listener);
        self.add(key, cell, true);
        self
    }

    fn add(&self, key: EventKey, cell: ListenerCell, prepend: bool) {
        // newListener observers hear about the registration before it lands,
        // so they cannot recurse on the listener being added.
        let announce = self.registry.lock().has(&NEW_LISTENER_EVENT.into());
        if announce {
            let reported = cell.reported();
            self.emit(
                NEW_LISTENER_EVENT,
                &[
                    EventValue::Key(key.clone()),
                    EventValue::Callback(reported),
                ],
            );
        }

        let warning = self.registry.lock().insert_cell(key, cell, prepend);
        if let Some(warning) = warning {
            log::warn!("{warning}");
        }
    }

    /// Build the self-removing wrapper cell for a once registration.
    ///
    /// The wrapper learns its own identity through the slot, filled right
    /// after construction. Both the slot entry and the bus handle are weak:
    /// the wrapper lives inside the registry, so strong references here
    /// would cycle and keep a dropped bus alive.
    fn once_cell(&self, key: EventKey, original: Listener) -> ListenerCell {
        let fired = Arc::new(AtomicBool::new(false));
        let bus = self.downgrade();
        let identity: Arc<OnceLock<Weak<ListenerFn>>> = Arc::new(OnceLock::new());

        let wrapper: Listener = {
            let identity = Arc::clone(&identity);
            let original = Arc::clone(&original);
            Arc::new(move |args: &[EventValue]| {
                // Guard against a caller invoking the raw wrapper twice.
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                let me = identity.get().and_then(Weak::upgrade);
                if let (Some(bus), Some(me)) = (bus.upgrade(), me) {
                    bus.remove_listener(key.clone(), &me);
                }
                original(args);
            })
        };
        let _ = identity.set(Arc::downgrade(&wrapper));

        ListenerCell::once(wrapper, original)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Remove the first listener for `key` matching `listener` by identity,
    /// either the callback itself or, for once registrations, its recorded
    /// original.
    ///
    /// A silent no-op when nothing matches.
    pub fn remove_listener(&self, key: impl Into<EventKey>, listener: &Listener) -> &Self {
        let key = key.into();
        let removed = self.registry.lock().remove_cell(&key, listener);
        if let Some(cell) = removed {
            self.announce_removal(&key, cell.reported());
        }
        self
    }

    /// Alias for [`remove_listener`](Self::remove_listener).
    pub fn off(&self, key: impl Into<EventKey>, listener: &Listener) -> &Self {
        self.remove_listener(key, listener)
    }

    /// Remove every listener for `key`, or for all keys when `key` is `None`.
    ///
    /// With `removeListener` observers registered, listeners come off one by
    /// one (newest first, each firing the meta-event); all other keys drain
    /// before `removeListener` itself so observers never hear removals
    /// against a list already being torn down.
    pub fn remove_all_listeners(&self, key: Option<EventKey>) -> &Self {
        let has_observers = self.registry.lock().has(&REMOVE_LISTENER_EVENT.into());
        if !has_observers {
            let mut registry = self.registry.lock();
            match key {
                Some(key) => registry.delete_key(&key),
                None => registry.clear(),
            }
            return self;
        }

        match key {
            Some(key) => self.drain_key(&key),
            None => {
                let keys: Vec<EventKey> = {
                    let registry = self.registry.lock();
                    registry
                        .order
                        .iter()
                        .filter(|k| k.as_name() != Some(REMOVE_LISTENER_EVENT))
                        .cloned()
                        .collect()
                };
                for key in &keys {
                    self.drain_key(key);
                }
                self.drain_key(&REMOVE_LISTENER_EVENT.into());
                // Observers may have re-registered during the final drain;
                // the operation guarantees an empty registry.
                self.registry.lock().clear();
            }
        }
        self
    }

    fn drain_key(&self, key: &EventKey) {
        let callbacks = {
            let registry = self.registry.lock();
            registry
                .entries
                .get(key)
                .map(ListenerEntry::raw_snapshot)
                .unwrap_or_default()
        };
        for callback in callbacks.iter().rev() {
            self.remove_listener(key.clone(), callback);
        }
    }

    fn announce_removal(&self, key: &EventKey, original: Listener) {
        let has_observers = self.registry.lock().has(&REMOVE_LISTENER_EVENT.into());
        if has_observers {
            self.emit(
                REMOVE_LISTENER_EVENT,
                &[
                    EventValue::Key(key.clone()),
                    EventValue::Callback(original),
                ],
            );
        }
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// Invoke every listener currently registered for `key`, in order, with
    /// `args`. Returns whether any listener was invoked.
    ///
    /// # Panics
    ///
    /// Emitting [`ERROR_EVENT`] with no listeners panics with a typed
    /// [`UnhandledError`] payload: unhandled error events are meant to
    /// crash the process, not be swallowed. Listener panics propagate
    /// unwrapped.
    pub fn emit(&self, key: impl Into<EventKey>, args: &[EventValue]) -> bool {
        let key = key.into();
        // Snapshot under the lock, dispatch outside it: mutations made by
        // listeners affect the next emission, never this one.
        let snapshot = {
            let registry = self.registry.lock();
            registry.entries.get(&key).map(ListenerEntry::raw_snapshot)
        };
        match snapshot {
            Some(listeners) => {
                for callback in listeners {
                    callback(args);
                }
                true
            }
            None => {
                if key.as_name() == Some(ERROR_EVENT) {
                    raise_unhandled(args);
                }
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// The listeners registered for `key`, once wrappers unwrapped to their
    /// original callbacks.
    pub fn listeners(&self, key: impl Into<EventKey>) -> Vec<Listener> {
        let key = key.into();
        let registry = self.registry.lock();
        registry
            .entries
            .get(&key)
            .map(ListenerEntry::unwrapped_snapshot)
            .unwrap_or_default()
    }

    /// The listeners registered for `key` as stored, once wrappers included.
    pub fn raw_listeners(&self, key: impl Into<EventKey>) -> Vec<Listener> {
        let key = key.into();
        let registry = self.registry.lock();
        registry
            .entries
            .get(&key)
            .map(ListenerEntry::raw_snapshot)
            .unwrap_or_default()
    }

    /// Number of listeners registered for `key`.
    pub fn listener_count(&self, key: impl Into<EventKey>) -> usize {
        let key = key.into();
        let registry = self.registry.lock();
        registry.entries.get(&key).map_or(0, ListenerEntry::len)
    }

    /// Keys with at least one listener, in registration order.
    pub fn event_names(&self) -> Vec<EventKey> {
        let registry = self.registry.lock();
        if registry.active_count == 0 {
            return Vec::new();
        }
        registry.order.clone()
    }

    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    /// Per-instance max-listeners override. `0` disables the leak warning.
    pub fn set_max_listeners(&self, limit: usize) -> &Self {
        self.registry.lock().max_listeners = Some(limit);
        self
    }

    /// The effective limit: the per-instance override, or the process-wide
    /// default when none is set.
    pub fn max_listeners(&self) -> usize {
        self.registry.lock().effective_limit()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("EventBus")
            .field("events", &registry.active_count)
            .field("max_listeners", &registry.max_listeners)
            .finish_non_exhaustive()
    }
}

/// Unhandled `"error"` emission: panic with the payload as a typed value so
/// a host panic hook can downcast and recover the context.
fn raise_unhandled(args: &[EventValue]) -> ! {
    let error = match args.first() {
        Some(EventValue::Error(cause)) => UnhandledError::from_cause(Arc::clone(cause)),
        other => UnhandledError::with_context(other.cloned()),
    };
    std::panic::panic_any(error);
}
