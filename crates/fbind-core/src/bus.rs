#![forbid(unsafe_code)]

//! Typed publish/subscribe channels and a type-keyed change bus.
//!
//! - [`Channel<T>`]: an ordered list of handlers for a single event type.
//! - [`ChangeBus`]: a registry of channels keyed by the event's [`TypeId`],
//!   so one object can carry unrelated event types.
//! - [`Subscription`]: RAII token returned by every `subscribe`; cancelling
//!   it (explicitly or by dropping it) removes the handler.
//!
//! # Architecture
//!
//! Channels use `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Delivery snapshots the handler list and releases the borrow before any
//! handler runs, so handlers may subscribe, cancel, or publish re-entrantly
//! on the same channel.
//!
//! # Invariants
//!
//! 1. Handlers are invoked in registration order.
//! 2. A handler registered during delivery is not invoked for that event.
//! 3. A handler cancelled during delivery is not invoked afterwards, even if
//!    it was part of the snapshot.
//! 4. [`Subscription::cancel`] is idempotent and may be called from inside
//!    the handler it cancels.
//! 5. Publishing never fails; with no handlers it is a no-op.
//!
//! # Failure Modes
//!
//! - Handler panic: propagates to the caller of `publish`; later handlers
//!   for that event are not invoked.
//! - Infinite publish chains: not detected. Callers that publish from a
//!   handler must break cycles themselves (see the adapter guard in
//!   `fbind-runtime`).

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<dyn Fn(&T)>;

struct Slot<T> {
    id: u64,
    live: Rc<Cell<bool>>,
    handler: Handler<T>,
}

struct ChannelInner<T> {
    slots: Vec<Slot<T>>,
    next_id: u64,
}

// ---------------------------------------------------------------------------
// Channel<T>
// ---------------------------------------------------------------------------

/// An ordered set of handlers for events of type `T`.
///
/// Cloning a `Channel` yields another handle to the same handler list.
pub struct Channel<T> {
    inner: Rc<RefCell<ChannelInner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Channel<T> {
    /// Create a channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                slots: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register `handler` and return the token that keeps it registered.
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        let live = Rc::new(Cell::new(true));
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.slots.push(Slot {
                id,
                live: Rc::clone(&live),
                handler: Rc::new(handler),
            });
            id
        };

        let weak: Weak<RefCell<ChannelInner<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(live, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let removed = {
                let mut inner = inner.borrow_mut();
                inner
                    .slots
                    .iter()
                    .position(|slot| slot.id == id)
                    .map(|pos| inner.slots.remove(pos))
            };
            // Dropped after the borrow ends: the handler may own other
            // subscriptions to this very channel.
            drop(removed);
        })
    }

    /// Deliver `event` to every live handler, in registration order.
    pub fn publish(&self, event: &T) {
        self.publish_until(event, || false);
    }

    /// Like [`publish`](Self::publish), but stop before the next handler once
    /// `superseded` returns true.
    ///
    /// Owners use this when a handler may publish a newer event on the same
    /// channel: the newer event has already reached everyone, so the rest of
    /// the outer delivery would only hand out a stale value.
    pub fn publish_until(&self, event: &T, superseded: impl Fn() -> bool) {
        let snapshot: Vec<(Rc<Cell<bool>>, Handler<T>)> = self
            .inner
            .borrow()
            .slots
            .iter()
            .map(|slot| (Rc::clone(&slot.live), Rc::clone(&slot.handler)))
            .collect();

        for (live, handler) in snapshot {
            if superseded() {
                break;
            }
            if live.get() {
                handler(event);
            }
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().slots.len()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.inner.borrow().slots.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Registration token for a handler on a [`Channel`] or [`ChangeBus`].
///
/// Dropping the token cancels the registration.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    live: Rc<Cell<bool>>,
    detach: Cell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn new(live: Rc<Cell<bool>>, detach: impl FnOnce() + 'static) -> Self {
        Self {
            live,
            detach: Cell::new(Some(Box::new(detach))),
        }
    }

    /// Remove the handler. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.live.set(false);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Whether the handler is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.live.get()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.live.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ChangeBus
// ---------------------------------------------------------------------------

/// Publish/subscribe across unrelated event types from one object.
///
/// Internally this is one [`Channel<T>`] per event type, created on first
/// subscription. Publishing a type nobody subscribed to does nothing.
///
/// ```
/// use fbind_core::bus::ChangeBus;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let bus = ChangeBus::new();
/// let total = Rc::new(Cell::new(0));
/// let t = Rc::clone(&total);
/// let _sub = bus.subscribe(move |n: &i32| t.set(t.get() + n));
///
/// bus.publish(&5_i32);
/// bus.publish(&"ignored");
/// assert_eq!(total.get(), 5);
/// ```
#[derive(Default)]
pub struct ChangeBus {
    channels: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl ChangeBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel carrying events of type `T`, created if missing.
    pub fn channel<T: 'static>(&self) -> Channel<T> {
        let mut channels = self.channels.borrow_mut();
        if let Some(channel) = channels
            .get(&TypeId::of::<T>())
            .and_then(|channel| channel.downcast_ref::<Channel<T>>())
        {
            return channel.clone();
        }
        let channel = Channel::<T>::new();
        channels.insert(TypeId::of::<T>(), Box::new(channel.clone()));
        channel
    }

    /// Register a handler for events of type `T`.
    pub fn subscribe<T: 'static>(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.channel::<T>().subscribe(handler)
    }

    /// Deliver `event` to every handler registered for `T`.
    pub fn publish<T: 'static>(&self, event: &T) {
        let channel = self
            .channels
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|channel| channel.downcast_ref::<Channel<T>>())
            .cloned();
        if let Some(channel) = channel {
            channel.publish(event);
        }
    }

    /// Number of handlers registered for `T`.
    #[must_use]
    pub fn subscriber_count<T: 'static>(&self) -> usize {
        self.channels
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|channel| channel.downcast_ref::<Channel<T>>())
            .map_or(0, Channel::subscriber_count)
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("channels", &self.channels.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
