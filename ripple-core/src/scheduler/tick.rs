//! Tick scheduler.
//!
//! Callbacks passed to [`next_tick`] are collected into one batch. The first
//! callback after a flush schedules a single host task; every later one just
//! joins the batch. Callbacks queued while a batch is flushing go into the
//! next batch.

use std::cell::RefCell;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ErrorContext, Result};
use crate::reactive::{report_error, Runtime};

/// Which host queue a tick flush goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPriority {
    #[default]
    Microtask,
    Macrotask,
}

type TickCallback = Box<dyn FnOnce() -> Result<()>>;

#[derive(Default)]
struct TickState {
    callbacks: Vec<TickCallback>,
    pending: bool,
    macro_depth: usize,
}

thread_local! {
    static TICK: RefCell<TickState> = RefCell::new(TickState::default());
}

/// Run `callback` in the next tick at the current priority.
pub fn next_tick<F>(callback: F)
where
    F: FnOnce() -> Result<()> + 'static,
{
    next_tick_with(callback, current_priority());
}

/// Run `callback` in the next tick. `priority` only matters when this call
/// starts a new batch.
pub fn next_tick_with<F>(callback: F, priority: TickPriority)
where
    F: FnOnce() -> Result<()> + 'static,
{
    let schedule = TICK.with(|state| {
        let mut state = state.borrow_mut();
        state.callbacks.push(Box::new(callback));
        !std::mem::replace(&mut state.pending, true)
    });
    if !schedule {
        return;
    }

    debug!(?priority, "schedule tick");
    let host = Runtime::host();
    match priority {
        TickPriority::Microtask => host.queue_microtask(Box::new(flush_callbacks)),
        TickPriority::Macrotask => host.queue_macrotask(Box::new(flush_callbacks)),
    }
}

/// Resolves once the tick batch it joins has flushed.
pub fn tick() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        // The receiver may already be gone.
        let _ = tx.send(());
        Ok(())
    });
    async move {
        let _ = rx.await;
    }
}

/// Run `f` with macrotask priority, so ticks it starts are macrotasks.
pub fn with_macro_task<R>(f: impl FnOnce() -> R) -> R {
    struct Restore;

    impl Drop for Restore {
        fn drop(&mut self) {
            TICK.with(|state| {
                let mut state = state.borrow_mut();
                state.macro_depth = state.macro_depth.saturating_sub(1);
            });
        }
    }

    TICK.with(|state| state.borrow_mut().macro_depth += 1);
    let _restore = Restore;
    f()
}

/// Priority that [`next_tick`] would use right now.
pub fn current_priority() -> TickPriority {
    let in_macro_task = TICK.with(|state| state.borrow().macro_depth > 0);
    if in_macro_task {
        TickPriority::Macrotask
    } else {
        Runtime::config().default_priority
    }
}

/// Callbacks waiting for the next flush.
pub fn pending_callbacks() -> usize {
    TICK.with(|state| state.borrow().callbacks.len())
}

fn flush_callbacks() {
    let callbacks = TICK.with(|state| {
        let mut state = state.borrow_mut();
        state.pending = false;
        std::mem::take(&mut state.callbacks)
    });
    debug!(callbacks = callbacks.len(), "flush tick");
    for callback in callbacks {
        if let Err(err) = callback() {
            report_error(err, ErrorContext::new("nextTick"));
        }
    }
}
