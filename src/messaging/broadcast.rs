// Synchronous broadcast streams for the control thread
//
// `Broadcast` fans every value out to all current listeners before the next
// value is dispatched. `Slot` is a single-value cell whose changes are
// broadcast, and which replays its current value to new listeners.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Token identifying one listener of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

pub struct Broadcast<T> {
    listeners: RefCell<Vec<(Subscription, Listener<T>)>>,
    next_id: Cell<u64>,
    pending: RefCell<VecDeque<T>>,
    dispatching: Cell<bool>,
}

impl<T: 'static> Broadcast<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            pending: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let id = Subscription(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let listener: Listener<T> = Rc::new(RefCell::new(listener));
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver `value` to every listener, in subscription order.
    ///
    /// Values emitted from inside a listener are queued and delivered once
    /// the current value has reached every listener.
    pub fn emit(&self, value: T) {
        self.pending.borrow_mut().push_back(value);
        if self.dispatching.get() {
            return;
        }

        self.dispatching.set(true);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(value) = next else {
                break;
            };

            let snapshot: Vec<(Subscription, Listener<T>)> = self.listeners.borrow().clone();
            for (id, listener) in snapshot {
                // A listener removed earlier in this round is skipped
                let still_subscribed = self.listeners.borrow().iter().any(|(s, _)| *s == id);
                if still_subscribed {
                    (listener.borrow_mut())(&value);
                }
            }
        }
        self.dispatching.set(false);
    }
}

impl<T: 'static> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-slot value with change notification
pub struct Slot<T> {
    value: RefCell<T>,
    changes: Broadcast<T>,
}

impl<T: Clone + 'static> Slot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: RefCell::new(initial),
            changes: Broadcast::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value and notify every listener
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value.clone();
        self.changes.emit(value);
    }

    /// Listen for changes; the listener is first called with the current value
    pub fn subscribe<F>(&self, mut listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let current = self.get();
        listener(&current);
        self.changes.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.changes.unsubscribe(subscription)
    }

    pub fn listener_count(&self) -> usize {
        self.changes.listener_count()
    }
}

impl<T: Clone + 'static> Slot<Option<T>> {
    /// Empty the slot, returning what it held
    pub fn take(&self) -> Option<T> {
        let previous = self.get();
        if previous.is_some() {
            self.set(None);
        }
        previous
    }
}
