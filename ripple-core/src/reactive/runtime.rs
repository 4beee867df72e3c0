//! Reactive Runtime
//!
//! The runtime holds the per-thread state that the rest of the system
//! shares: configuration, the error handler, and the task host that runs
//! deferred flushes.
//!
//! # How It Works
//!
//! 1. Reads during a subscriber's evaluation link publishers to it through
//!    the context stack.
//!
//! 2. Writes notify publishers, which either run subscribers synchronously
//!    or queue them with the scheduler.
//!
//! 3. The scheduler defers its flush through the tick scheduler, which hands
//!    one task to the host. With the default [`EventLoop`] host nothing runs
//!    until [`Runtime::run_until_idle`] is called.
//!
//! # Threading
//!
//! Everything here is thread-local. Reactive handles are `Rc`-based and stay
//! on the thread that created them, so there is nothing to lock.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use tracing::{error, warn};

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;
use crate::config::RuntimeConfig;
use crate::error::{ErrorContext, ReactiveError};
use crate::scheduler::{EventLoop, TaskHost};

/// Receives every error the runtime cannot return to a caller.
pub type ErrorHandler = Rc<dyn Fn(&ReactiveError, &ErrorContext)>;

struct RuntimeState {
    config: RuntimeConfig,
    error_handler: Option<ErrorHandler>,
    event_loop: Rc<EventLoop>,
    host: Rc<dyn TaskHost>,
}

impl RuntimeState {
    fn new() -> Self {
        let event_loop = Rc::new(EventLoop::new());
        Self {
            config: RuntimeConfig::default(),
            error_handler: None,
            host: event_loop.clone(),
            event_loop,
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Install a configuration for this thread.
    pub fn configure(config: RuntimeConfig) {
        RUNTIME.with(|rt| rt.borrow_mut().config = config);
    }

    /// The current configuration.
    pub fn config() -> RuntimeConfig {
        RUNTIME.with(|rt| rt.borrow().config.clone())
    }

    pub fn max_update_count() -> usize {
        RUNTIME.with(|rt| rt.borrow().config.max_update_count)
    }

    /// Route reported errors to `handler` instead of the log.
    pub fn set_error_handler<F>(handler: F)
    where
        F: Fn(&ReactiveError, &ErrorContext) + 'static,
    {
        RUNTIME.with(|rt| rt.borrow_mut().error_handler = Some(Rc::new(handler)));
    }

    pub fn clear_error_handler() {
        RUNTIME.with(|rt| rt.borrow_mut().error_handler = None);
    }

    /// Run deferred work on `host` from now on.
    pub fn set_host(host: Rc<dyn TaskHost>) {
        RUNTIME.with(|rt| rt.borrow_mut().host = host);
    }

    /// Go back to the built-in event loop.
    pub fn use_event_loop() {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.host = rt.event_loop.clone();
        });
    }

    pub fn host() -> Rc<dyn TaskHost> {
        RUNTIME.with(|rt| rt.borrow().host.clone())
    }

    /// The built-in event loop, whether or not it is the active host.
    pub fn event_loop() -> Rc<EventLoop> {
        RUNTIME.with(|rt| rt.borrow().event_loop.clone())
    }

    /// Drain the built-in event loop. Returns the number of tasks run.
    pub fn run_until_idle() -> usize {
        Self::event_loop().run_until_idle()
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Hand `error` to the installed handler, or log it.
pub fn report_error(error: ReactiveError, context: ErrorContext) {
    let handler = RUNTIME.with(|rt| rt.borrow().error_handler.clone());
    match handler {
        Some(handler) => handler(&error, &context),
        None => error!(context = %context, "{error}"),
    }
}

/// Emit a warning unless the runtime is configured to be silent.
pub(crate) fn warn(message: impl Display) {
    let silent = RUNTIME.with(|rt| rt.borrow().config.silent);
    if !silent {
        warn!("{message}");
    }
}
