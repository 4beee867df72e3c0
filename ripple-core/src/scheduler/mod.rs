//! Update Scheduling
//!
//! This module batches subscriber re-runs into asynchronous flush cycles.
//!
//! # Overview
//!
//! Three layers, leaves first:
//!
//! - `host`: where deferred work actually runs. [`EventLoop`] is a
//!   deterministic in-process loop; [`TokioHost`] spawns onto the current
//!   `tokio` `LocalSet`.
//!
//! - `tick`: the callback batch that rides on the host. Any number of
//!   [`next_tick`] calls between two flushes cost one host task.
//!
//! - `queue`: the subscriber queue. Subscribers notified in the same tick
//!   are deduplicated and run once, in creation order.
//!
//! # Design Decisions
//!
//! 1. Flushes run in ascending subscriber id order. Subscribers are created
//!    parent before child and computed before render, so this order runs
//!    upstream work first and skips children a parent tears down.
//!
//! 2. A subscriber queued while a flush is in progress runs in the same
//!    flush, at its id position but never before the one currently running.
//!
//! 3. A subscriber that keeps re-queueing itself is cut off after a bounded
//!    number of runs and reported as a runaway update.

mod host;
mod queue;
mod tick;

pub use host::{EventLoop, Task, TaskHost, TokioHost};
pub use queue::{flush_scheduler_queue, is_flushing, pending_count, queue_watcher, Job};
pub use tick::{
    current_priority, next_tick, next_tick_with, pending_callbacks, tick, with_macro_task,
    TickPriority,
};
