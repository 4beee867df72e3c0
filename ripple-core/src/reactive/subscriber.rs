//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values:
//! render passes, computed values and user watchers. Publishers only know
//! subscribers through the [`Subscriber`] trait.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Ids are handed out in creation order. The scheduler relies on this: a
/// parent created before its children always has the smaller id and is
/// flushed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that wants to be told when a computation should re-run.
///
/// Publishers call [`Subscriber::update`] on every subscriber when they
/// change, and call [`Subscriber::add_dep`] on the active subscriber when
/// they are read.
pub trait Subscriber {
    /// Get the subscriber ID.
    fn id(&self) -> SubscriberId;

    /// Record that `dep` was read during the current run.
    fn add_dep(&self, dep: &Dep);

    /// One of the publishers this subscriber read has changed.
    fn update(&self);
}
