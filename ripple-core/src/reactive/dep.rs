//! Publisher Implementation
//!
//! A `Dep` is the broadcast channel behind one reactive field or one tracked
//! container. It keeps the list of subscribers that read it during their
//! last run and tells all of them when it changes.
//!
//! # How Publishers Work
//!
//! 1. When a dep is read within a reactive context, [`Dep::depend`] asks the
//!    active subscriber to record it. The subscriber decides whether it
//!    still needs to call [`Dep::add_sub`].
//!
//! 2. When the underlying value changes, [`Dep::notify`] calls `update()` on
//!    a snapshot of the subscriber list, so subscriptions made or dropped
//!    while notifying take effect from the next notification on.
//!
//! List order carries no guarantee; the scheduler sorts what it runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Unique identifier for a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct DepInner {
    id: DepId,
    subs: RefCell<Vec<Rc<dyn Subscriber>>>,
}

/// A publisher with an ordered, deduplicated subscriber list.
///
/// Cloning a `Dep` yields another handle to the same publisher.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: DepId::next(),
            subs: RefCell::new(Vec::new()),
        }))
    }

    /// Get the dep's unique ID.
    pub fn id(&self) -> DepId {
        self.0.id
    }

    /// Subscribe `sub`. A subscriber that is already present is not added twice.
    pub fn add_sub(&self, sub: Rc<dyn Subscriber>) {
        let mut subs = self.0.subs.borrow_mut();
        let id = sub.id();
        if subs.iter().any(|existing| existing.id() == id) {
            return;
        }
        trace!(dep = self.0.id.0, subscriber = %id, "subscribe");
        subs.push(sub);
    }

    /// Remove a subscriber. Removing one that is absent does nothing.
    pub fn remove_sub(&self, id: SubscriberId) {
        let mut subs = self.0.subs.borrow_mut();
        if let Some(index) = subs.iter().position(|sub| sub.id() == id) {
            trace!(dep = self.0.id.0, subscriber = %id, "unsubscribe");
            subs.remove(index);
        }
    }

    /// Link this dep to the active subscriber, if there is one.
    pub fn depend(&self) {
        if let Some(target) = ReactiveContext::current() {
            target.add_dep(self);
        }
    }

    /// Tell every current subscriber that this dep changed.
    pub fn notify(&self) {
        // Stabilize the subscriber list first.
        let subs: Vec<Rc<dyn Subscriber>> = self.0.subs.borrow().clone();
        trace!(dep = self.0.id.0, subscribers = subs.len(), "notify");
        for sub in subs {
            sub.update();
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.0.subs.borrow().len()
    }

    /// Check whether `id` is subscribed.
    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.0.subs.borrow().iter().any(|sub| sub.id() == id)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Dep {}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
