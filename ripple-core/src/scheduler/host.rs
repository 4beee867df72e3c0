//! Task hosts.
//!
//! The scheduler never runs deferred work itself; it hands one task per tick
//! to the thread's [`TaskHost`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use tracing::trace;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Something that can run tasks later on the current thread.
pub trait TaskHost {
    /// Run `task` before the next macrotask.
    fn queue_microtask(&self, task: Task);

    /// Run `task` after all pending microtasks.
    fn queue_macrotask(&self, task: Task);
}

/// Deterministic single-threaded event loop.
///
/// Nothing runs until [`EventLoop::run_until_idle`] (or
/// [`EventLoop::run_microtasks`]) is called.
#[derive(Default)]
pub struct EventLoop {
    microtasks: RefCell<VecDeque<Task>>,
    macrotasks: RefCell<VecDeque<Task>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run microtasks until none are left, including ones queued meanwhile.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.microtasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Alternate between draining microtasks and running one macrotask
    /// until both queues are empty. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            ran += self.run_microtasks();
            let next = self.macrotasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            trace!(tasks = ran, "event loop idle");
        }
        ran
    }

    /// Number of queued tasks of either kind.
    pub fn pending(&self) -> usize {
        self.microtasks.borrow().len() + self.macrotasks.borrow().len()
    }
}

impl TaskHost for EventLoop {
    fn queue_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }

    fn queue_macrotask(&self, task: Task) {
        self.macrotasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("microtasks", &self.microtasks.borrow().len())
            .field("macrotasks", &self.macrotasks.borrow().len())
            .finish()
    }
}

/// Runs tasks on the current `tokio` `LocalSet`.
///
/// Must be used from within `LocalSet::run_until` (or a task spawned on a
/// `LocalSet`); `spawn_local` panics anywhere else. Macrotasks yield to
/// the runtime once before running.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioHost;

impl TaskHost for TokioHost {
    fn queue_microtask(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }

    fn queue_macrotask(&self, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| -> Task {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(name))
        };
        (log, make)
    }

    #[test]
    fn microtasks_run_before_macrotasks() {
        let host = EventLoop::new();
        let (log, task) = recorder();

        host.queue_macrotask(task("macro-1"));
        host.queue_microtask(task("micro-1"));
        host.queue_macrotask(task("macro-2"));
        host.queue_microtask(task("micro-2"));

        assert_eq!(host.pending(), 4);
        assert_eq!(host.run_until_idle(), 4);
        assert_eq!(*log.borrow(), vec!["micro-1", "micro-2", "macro-1", "macro-2"]);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn microtasks_queued_by_a_macrotask_run_before_the_next_one() {
        let host = Rc::new(EventLoop::new());
        let (log, task) = recorder();
        let inner = host.clone();
        let nested = task("nested-micro");

        host.queue_macrotask(Box::new(move || inner.queue_microtask(nested)));
        host.queue_macrotask(task("macro-2"));
        host.run_until_idle();

        assert_eq!(*log.borrow(), vec!["nested-micro", "macro-2"]);
    }

    #[test]
    fn run_microtasks_leaves_macrotasks() {
        let host = EventLoop::new();
        let (log, task) = recorder();
        host.queue_macrotask(task("macro"));
        host.queue_microtask(task("micro"));

        assert_eq!(host.run_microtasks(), 1);
        assert_eq!(*log.borrow(), vec!["micro"]);
        assert_eq!(host.pending(), 1);
    }

    #[tokio::test]
    async fn tokio_host_runs_on_local_set() {
        let local = tokio::task::LocalSet::new();
        let (log, task) = recorder();
        local
            .run_until(async {
                TokioHost.queue_macrotask(task("macro"));
                TokioHost.queue_microtask(task("micro"));
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
            })
            .await;
        local.await;
        assert_eq!(log.borrow().len(), 2);
    }
}
