//! Subscriber queue.
//!
//! # Algorithm
//!
//! 1. `queue_watcher` records the job's id and appends it. The first job
//!    queued after an idle period schedules one flush through the tick
//!    scheduler.
//!
//! 2. The flush sorts the queue by id and walks it with a cursor. For each
//!    job: call its pre-run hook, clear its queued mark, run it.
//!
//! 3. A job queued while flushing is inserted at its id position, but never
//!    at or before the cursor. A job that re-queues itself therefore runs
//!    again right after the current run, and is counted; past the runaway
//!    limit the flush is abandoned.
//!
//! 4. Once the queue is exhausted the state is reset, so jobs queued from
//!    here on start a new flush, and the after-flush hooks of the jobs that
//!    ran are called in queue order.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use super::tick::next_tick;
use crate::error::{ErrorContext, ReactiveError, Result};
use crate::reactive::{report_error, Runtime, SubscriberId};

/// Something the scheduler can run.
pub trait Job {
    fn id(&self) -> SubscriberId;

    /// Called right before `run` during a flush.
    fn before_run(&self) {}

    fn run(&self) -> Result<()>;

    /// Called once after the flush that ran this job.
    fn after_flush(&self) {}

    /// Label used in diagnostics.
    fn expression(&self) -> String {
        self.id().to_string()
    }
}

#[derive(Default)]
struct QueueState {
    queue: Vec<Rc<dyn Job>>,
    has: HashSet<SubscriberId>,
    circular: HashMap<SubscriberId, usize>,
    waiting: bool,
    flushing: bool,
    index: usize,
}

thread_local! {
    static QUEUE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

/// Queue `job` for the next flush. Jobs already queued are ignored.
pub fn queue_watcher(job: Rc<dyn Job>) {
    let id = job.id();
    let schedule = QUEUE.with(|state| {
        let mut state = state.borrow_mut();
        if !state.has.insert(id) {
            return false;
        }
        if state.flushing {
            let mut position = state.queue.len();
            while position > state.index + 1 && state.queue[position - 1].id() > id {
                position -= 1;
            }
            state.queue.insert(position, job);
        } else {
            state.queue.push(job);
        }
        !std::mem::replace(&mut state.waiting, true)
    });

    if schedule {
        next_tick(|| {
            flush_scheduler_queue();
            Ok(())
        });
    }
}

/// Run every queued job. Normally called from the tick the first
/// `queue_watcher` scheduled.
pub fn flush_scheduler_queue() {
    let limit = Runtime::max_update_count();
    let total = QUEUE.with(|state| {
        let mut state = state.borrow_mut();
        state.flushing = true;
        state.index = 0;
        state.queue.sort_by_key(|job| job.id());
        state.queue.len()
    });
    debug!(jobs = total, "flush start");

    let mut ran = 0;
    loop {
        let next = QUEUE.with(|state| {
            let state = state.borrow();
            state.queue.get(state.index).cloned()
        });
        let Some(job) = next else {
            break;
        };
        let id = job.id();

        job.before_run();
        QUEUE.with(|state| state.borrow_mut().has.remove(&id));
        if let Err(err) = job.run() {
            report_error(err, ErrorContext::for_subscriber(id, "flush"));
        }
        ran += 1;

        let runaway = QUEUE.with(|state| {
            let mut state = state.borrow_mut();
            if !state.has.contains(&id) {
                return false;
            }
            let count = state.circular.entry(id).or_insert(0);
            *count += 1;
            *count > limit
        });
        if runaway {
            warn!(subscriber = %id, limit, "runaway update");
            report_error(
                ReactiveError::RunawayUpdate {
                    id,
                    expression: job.expression(),
                    limit,
                },
                ErrorContext::for_subscriber(id, "flush"),
            );
            break;
        }

        QUEUE.with(|state| state.borrow_mut().index += 1);
    }

    let finished = QUEUE.with(|state| {
        let mut state = state.borrow_mut();
        let mut finished = std::mem::take(&mut state.queue);
        finished.truncate(ran);
        *state = QueueState::default();
        finished
    });

    let mut seen = HashSet::new();
    for job in &finished {
        if seen.insert(job.id()) {
            job.after_flush();
        }
    }
    debug!(ran, "flush end");
}

/// Whether a flush is running.
pub fn is_flushing() -> bool {
    QUEUE.with(|state| state.borrow().flushing)
}

/// Jobs queued and not yet started.
pub fn pending_count() -> usize {
    QUEUE.with(|state| state.borrow().has.len())
}
