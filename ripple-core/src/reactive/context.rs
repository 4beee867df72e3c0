//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently evaluating.
//! When a publisher is read, it links itself to the subscriber on top of
//! the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack rather than a single slot because one
//! evaluation may synchronously start another: a parent render pass
//! constructing a child's render watcher, or a render pass reading a
//! computed value that has to re-evaluate. When the inner evaluation
//! finishes, its guard pops and linking resumes for the outer subscriber.
//!
//! A frame can also be empty. Code running under an empty frame reads
//! reactive data without linking to anything.

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Rc<dyn Subscriber>>>> = RefCell::new(Vec::new());
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the evaluation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Make `subscriber` the linking target until the guard is dropped.
    pub fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(subscriber)));
        Self { subscriber_id }
    }

    /// Push an empty frame: reads under it link to nothing.
    pub fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self {
            subscriber_id: None,
        }
    }

    /// Run `f` without linking any reads to the current subscriber.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _ctx = Self::enter_untracked();
        f()
    }

    /// Check if a subscriber is currently collecting dependencies.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// The subscriber on top of the stack, if any.
    pub fn current() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Self::current().map(|subscriber| subscriber.id())
    }

    /// Number of frames on the stack, empty frames included.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Guards must be dropped in reverse order of creation.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.map(|subscriber| subscriber.id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}
