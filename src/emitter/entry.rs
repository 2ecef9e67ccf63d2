//! Per-key listener storage.
//!
//! The common case is a single listener per key, stored without a Vec
//! allocation; the slot upgrades to a list on the second registration and
//! collapses back when the list shrinks to one.

use std::sync::Arc;

use crate::value::Listener;

/// One registered listener.
///
/// For `once` registrations `callback` is the self-removing wrapper and
/// `origin` the caller's original callback; removal and `listeners()` match
/// against either.
pub(super) struct ListenerCell {
    pub(super) callback: Listener,
    pub(super) origin: Option<Listener>,
}

impl ListenerCell {
    pub(super) fn plain(callback: Listener) -> Self {
        Self {
            callback,
            origin: None,
        }
    }

    pub(super) fn once(wrapper: Listener, origin: Listener) -> Self {
        Self {
            callback: wrapper,
            origin: Some(origin),
        }
    }

    /// Identity match against the invoked callback or the recorded original.
    pub(super) fn matches(&self, target: &Listener) -> bool {
        Arc::ptr_eq(&self.callback, target)
            || self
                .origin
                .as_ref()
                .is_some_and(|origin| Arc::ptr_eq(origin, target))
    }

    /// The callback to report to callers: the original for once
    /// registrations, the callback itself otherwise.
    pub(super) fn reported(&self) -> Listener {
        self.origin
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.callback))
    }
}

enum ListenerSlot {
    Single(ListenerCell),
    Many(Vec<ListenerCell>),
}

/// The registry value for one event key.
pub(super) struct ListenerEntry {
    slot: ListenerSlot,
    /// Set once the leak warning for the current threshold crossing fired.
    pub(super) warned: bool,
}

impl ListenerEntry {
    pub(super) fn new(cell: ListenerCell) -> Self {
        Self {
            slot: ListenerSlot::Single(cell),
            warned: false,
        }
    }

    pub(super) fn len(&self) -> usize {
        match &self.slot {
            ListenerSlot::Single(_) => 1,
            ListenerSlot::Many(list) => list.len(),
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        match &self.slot {
            ListenerSlot::Single(_) => false,
            ListenerSlot::Many(list) => list.is_empty(),
        }
    }

    pub(super) fn insert(&mut self, cell: ListenerCell, prepend: bool) {
        let slot = std::mem::replace(&mut self.slot, ListenerSlot::Many(Vec::new()));
        self.slot = match slot {
            ListenerSlot::Single(existing) => ListenerSlot::Many(if prepend {
                vec![cell, existing]
            } else {
                vec![existing, cell]
            }),
            ListenerSlot::Many(mut list) => {
                if prepend {
                    list.insert(0, cell);
                } else {
                    list.push(cell);
                }
                ListenerSlot::Many(list)
            }
        };
    }

    /// Remove the first cell matching `target`. Returns the removed cell;
    /// the caller deletes the whole entry if this leaves it empty.
    pub(super) fn remove_first(&mut self, target: &Listener) -> Option<ListenerCell> {
        let slot = std::mem::replace(&mut self.slot, ListenerSlot::Many(Vec::new()));
        match slot {
            ListenerSlot::Single(cell) => {
                if cell.matches(target) {
                    Some(cell)
                } else {
                    self.slot = ListenerSlot::Single(cell);
                    None
                }
            }
            ListenerSlot::Many(mut list) => {
                let found = list
                    .iter()
                    .position(|cell| cell.matches(target))
                    .map(|index| list.remove(index));
                self.slot = if list.len() == 1 {
                    ListenerSlot::Single(list.remove(0))
                } else {
                    ListenerSlot::Many(list)
                };
                found
            }
        }
    }

    /// The callbacks as stored, in dispatch order (once wrappers included).
    pub(super) fn raw_snapshot(&self) -> Vec<Listener> {
        match &self.slot {
            ListenerSlot::Single(cell) => vec![Arc::clone(&cell.callback)],
            ListenerSlot::Many(list) => {
                list.iter().map(|cell| Arc::clone(&cell.callback)).collect()
            }
        }
    }

    /// The callbacks with once wrappers unwrapped to their originals.
    pub(super) fn unwrapped_snapshot(&self) -> Vec<Listener> {
        match &self.slot {
            ListenerSlot::Single(cell) => vec![cell.reported()],
            ListenerSlot::Many(list) => list.iter().map(ListenerCell::reported).collect(),
        }
    }
}
