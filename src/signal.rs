//! Synchronous publish/subscribe signals
//!
//! Single-threaded: handlers are plain `FnMut` closures kept behind
//! `RefCell`, the same way libseat callbacks share state through
//! `Rc<RefCell<..>>`.
//!
//! Handlers run in subscription order. A handler may subscribe or
//! unsubscribe on the signal it is being called from; those changes are
//! applied once the running `emit` returns.

use log::trace;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Handle returned by [`Signal::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Box<dyn FnMut(&T)>;

struct Slot<T> {
    id: SubscriptionId,
    handler: Handler<T>,
}

pub struct Signal<T> {
    slots: RefCell<Vec<Slot<T>>>,
    /// Subscriptions made during emit
    pending_add: RefCell<Vec<Slot<T>>>,
    /// Unsubscriptions made during emit
    pending_remove: RefCell<Vec<SubscriptionId>>,
    /// Ids of the slots taken out for the running emit
    in_flight: RefCell<Vec<SubscriptionId>>,
    emitting: Cell<bool>,
    next_id: Cell<u64>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            pending_add: RefCell::new(Vec::new()),
            pending_remove: RefCell::new(Vec::new()),
            in_flight: RefCell::new(Vec::new()),
            emitting: Cell::new(false),
            next_id: Cell::new(1),
        }
    }

    /// Register a handler; it sees every emit that starts after this call
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let slot = Slot {
            id,
            handler: Box::new(handler),
        };
        if self.emitting.get() {
            self.pending_add.borrow_mut().push(slot);
        } else {
            self.slots.borrow_mut().push(slot);
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.emitting.get() {
            // A subscription added and removed within the same emit never lands
            self.pending_add.borrow_mut().retain(|s| s.id != id);
            let mut pending = self.pending_remove.borrow_mut();
            if self.in_flight.borrow().contains(&id) && !pending.contains(&id) {
                pending.push(id);
            }
        } else {
            self.slots.borrow_mut().retain(|s| s.id != id);
        }
    }

    /// Call every handler with `value`, in subscription order
    pub fn emit(&self, value: &T) {
        if self.emitting.get() {
            trace!("signal: nested emit dropped");
            return;
        }

        self.emitting.set(true);
        let mut slots = std::mem::take(&mut *self.slots.borrow_mut());
        *self.in_flight.borrow_mut() = slots.iter().map(|s| s.id).collect();
        for slot in slots.iter_mut() {
            (slot.handler)(value);
        }
        self.in_flight.borrow_mut().clear();
        self.emitting.set(false);

        let removed = std::mem::take(&mut *self.pending_remove.borrow_mut());
        if !removed.is_empty() {
            slots.retain(|s| !removed.contains(&s.id));
        }
        slots.append(&mut self.pending_add.borrow_mut());
        *self.slots.borrow_mut() = slots;
    }

    /// Handlers the next emit will call, counting changes deferred by a running emit
    pub fn subscriber_count(&self) -> usize {
        let live = if self.emitting.get() {
            self.in_flight.borrow().len() - self.pending_remove.borrow().len()
        } else {
            self.slots.borrow().len()
        };
        live + self.pending_add.borrow().len()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
