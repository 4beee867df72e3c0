//! Watcher Implementation
//!
//! A `Watcher` is the unit of re-computation. Render passes, computed values
//! and user watch callbacks are all watchers; they differ only in options.
//!
//! # How Watchers Work
//!
//! 1. `get()` pushes the watcher onto the context stack and runs the
//!    evaluator. Every publisher read during the run calls back into
//!    `add_dep`, which records it in the current-run set and subscribes if
//!    the previous run had not.
//!
//! 2. After the run, publishers from the previous run that were not read
//!    again are unsubscribed and the two sets swap. A watcher is therefore
//!    linked to exactly what its last run read.
//!
//! 3. When a publisher notifies, `update()` decides what happens:
//!    - lazy (computed) watchers with no subscribers of their own only mark
//!      themselves dirty; with subscribers they recompute now and notify
//!      their own publisher if the value changed;
//!    - sync watchers run immediately;
//!    - everything else is queued with the scheduler.
//!
//! 4. `run()` re-evaluates and calls the callback with `(new, old)` when the
//!    value changed, is a container (which may have mutated in place), or
//!    the watcher is deep.
//!
//! # Ownership
//!
//! Publishers hold strong references to their subscribers, so a watcher and
//! the publishers it reads keep each other alive. `teardown()` breaks the
//! links. [`Computed`](super::Computed) calls it when its last handle is
//! dropped; user watchers and render watchers are stopped explicitly.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::path::{parse_path, resolve};
use super::runtime::report_error;
use super::subscriber::{Subscriber, SubscriberId};
use super::traverse::traverse;
use super::value::Value;
use crate::error::{ErrorContext, ReactiveError, Result};
use crate::scheduler::{queue_watcher, Job};

/// Computes a watcher's value.
pub type Evaluator = Rc<dyn Fn() -> Result<Value>>;

/// Receives `(new, old)` when a watcher's value changes.
pub type Callback = Rc<dyn Fn(&Value, &Value) -> Result<()>>;

/// Side-effect hook without arguments.
pub type Hook = Rc<dyn Fn()>;

/// Construction options.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Read the whole value after every evaluation.
    pub deep: bool,
    /// Errors from the evaluator and callback are reported, not returned.
    pub user: bool,
    /// Do not evaluate until asked; the computed-value policy.
    pub lazy: bool,
    /// Run on notification instead of queueing.
    pub sync: bool,
    /// Called by the scheduler right before each queued run.
    pub before: Option<Hook>,
    /// Called once after each flush that ran this watcher.
    pub after: Option<Hook>,
    /// Diagnostic label. Defaults to the path, or `anonymous getter`.
    pub label: Option<String>,
}

/// What a watcher evaluates.
#[derive(Clone)]
pub enum WatchSource {
    Getter(Evaluator),
    /// A dotted path resolved against `root`.
    Path { root: Value, path: String },
}

impl WatchSource {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::Getter(Rc::new(f))
    }

    pub fn path(root: Value, path: impl Into<String>) -> Self {
        Self::Path {
            root,
            path: path.into(),
        }
    }
}

type DepList = SmallVec<[Dep; 4]>;

struct WatcherInner {
    id: SubscriberId,
    expression: String,
    evaluator: Evaluator,
    callback: Option<Callback>,

    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    before: Option<Hook>,
    after: Option<Hook>,

    value: RefCell<Value>,

    /// Publishers read during the last completed run.
    deps: RefCell<DepList>,
    dep_ids: RefCell<HashSet<DepId>>,

    /// Publishers read during the run in progress.
    new_deps: RefCell<DepList>,
    new_dep_ids: RefCell<HashSet<DepId>>,

    active: Cell<bool>,
    dirty: Cell<bool>,

    /// Lazy watchers publish their own value.
    own_dep: Option<Dep>,

    this: Weak<WatcherInner>,
}

impl WatcherInner {
    /// Evaluate and re-collect dependencies.
    ///
    /// `Ok(None)` means a user evaluator failed; the error has already been
    /// reported and the previous value stands.
    fn get(&self) -> Result<Option<Value>> {
        let Some(this) = self.this.upgrade() else {
            return Ok(None);
        };
        let outcome = {
            let _ctx = ReactiveContext::enter(this.clone());
            let outcome = (self.evaluator)();
            if let Ok(value) = &outcome {
                if self.deep && self.active.get() {
                    traverse(value);
                }
            }
            outcome
        };
        self.cleanup_deps();
        drop(this);

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) if self.user => {
                report_error(
                    err,
                    ErrorContext::for_subscriber(
                        self.id,
                        format!("getter for watcher \"{}\"", self.expression),
                    ),
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn cleanup_deps(&self) {
        {
            let new_ids = self.new_dep_ids.borrow();
            for dep in self.deps.borrow().iter() {
                if !new_ids.contains(&dep.id()) {
                    dep.remove_sub(self.id);
                }
            }
        }
        self.dep_ids.swap(&self.new_dep_ids);
        self.new_dep_ids.borrow_mut().clear();
        self.deps.swap(&self.new_deps);
        self.new_deps.borrow_mut().clear();

        // Torn down while evaluating.
        if !self.active.get() {
            self.unsubscribe_all();
        }
    }

    fn unsubscribe_all(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in &deps {
            dep.remove_sub(self.id);
        }
        self.dep_ids.borrow_mut().clear();
    }

    fn get_and_invoke<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&Value, &Value) -> Result<()>,
    {
        let Some(value) = self.get()? else {
            return Ok(());
        };
        let changed = !value.strict_eq(&self.value.borrow()) || value.is_object() || self.deep;
        if !changed {
            return Ok(());
        }

        let old = self.value.replace(value.clone());
        self.dirty.set(false);
        match callback(&value, &old) {
            Err(err) if self.user => {
                report_error(
                    err,
                    ErrorContext::for_subscriber(
                        self.id,
                        format!("callback for watcher \"{}\"", self.expression),
                    ),
                );
                Ok(())
            }
            other => other,
        }
    }

    fn rerun(&self) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }
        match &self.callback {
            Some(callback) => {
                let callback = callback.clone();
                self.get_and_invoke(|new, old| callback(new, old))
            }
            None => self.get_and_invoke(|_, _| Ok(())),
        }
    }

    fn evaluate(&self) -> Result<Value> {
        if self.dirty.get() {
            if let Some(value) = self.get()? {
                *self.value.borrow_mut() = value;
            }
            self.dirty.set(false);
        }
        Ok(self.value.borrow().clone())
    }

    fn depend(&self) {
        if let Some(own) = &self.own_dep {
            if ReactiveContext::is_active() {
                own.depend();
            }
        }
    }

    fn teardown(&self) {
        if !self.active.replace(false) {
            return;
        }
        debug!(subscriber = %self.id, expression = %self.expression, "teardown");
        self.unsubscribe_all();
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(&self, dep: &Dep) {
        if !self.active.get() {
            return;
        }
        let id = dep.id();
        if !self.new_dep_ids.borrow_mut().insert(id) {
            return;
        }
        self.new_deps.borrow_mut().push(dep.clone());
        if !self.dep_ids.borrow().contains(&id) {
            if let Some(this) = self.this.upgrade() {
                dep.add_sub(this);
            }
        }
    }

    fn update(&self) {
        if let Some(own) = &self.own_dep {
            if own.subscriber_count() == 0 {
                self.dirty.set(true);
                return;
            }
            // Someone depends on this value: recompute now and pass the
            // change on only if there is one.
            let own = own.clone();
            let result = self.get_and_invoke(|_, _| {
                own.notify();
                Ok(())
            });
            if let Err(err) = result {
                self.dirty.set(true);
                report_error(
                    err,
                    ErrorContext::for_subscriber(
                        self.id,
                        format!("computed \"{}\"", self.expression),
                    ),
                );
            }
        } else if self.sync {
            if let Err(err) = self.rerun() {
                report_error(
                    err,
                    ErrorContext::for_subscriber(
                        self.id,
                        format!("sync watcher \"{}\"", self.expression),
                    ),
                );
            }
        } else if let Some(this) = self.this.upgrade() {
            trace!(subscriber = %self.id, "queue");
            queue_watcher(this);
        }
    }
}

impl Job for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn before_run(&self) {
        if let Some(before) = &self.before {
            before();
        }
    }

    fn run(&self) -> Result<()> {
        self.rerun()
    }

    fn after_flush(&self) {
        if let Some(after) = &self.after {
            after();
        }
    }

    fn expression(&self) -> String {
        self.expression.clone()
    }
}

/// Handle to a watcher.
///
/// Cloning yields another handle to the same watcher. Dropping every handle
/// does not stop a watcher that still has dependencies; call
/// [`Watcher::teardown`].
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

impl Watcher {
    /// Create a watcher. Unless it is lazy, it evaluates once right away.
    ///
    /// If a non-user watcher's first evaluation fails, the watcher is torn
    /// down and the error returned.
    pub fn new(
        source: WatchSource,
        callback: Option<Callback>,
        options: WatcherOptions,
    ) -> Result<Self> {
        let watcher = Self::build(source, callback, options);
        if !watcher.0.lazy {
            match watcher.0.get() {
                Ok(Some(value)) => *watcher.0.value.borrow_mut() = value,
                Ok(None) => {}
                Err(err) => {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }
        Ok(watcher)
    }

    /// Create a watcher without evaluating it.
    pub(crate) fn build(
        source: WatchSource,
        callback: Option<Callback>,
        options: WatcherOptions,
    ) -> Self {
        let id = SubscriberId::new();
        let (evaluator, expression) = match source {
            WatchSource::Getter(getter) => (
                getter,
                options
                    .label
                    .unwrap_or_else(|| "anonymous getter".to_string()),
            ),
            WatchSource::Path { root, path } => {
                let evaluator: Evaluator = match parse_path(&path) {
                    Some(segments) => Rc::new(move || Ok(resolve(&root, &segments))),
                    None => {
                        report_error(
                            ReactiveError::InvalidPath { path: path.clone() },
                            ErrorContext::for_subscriber(id, "watcher construction"),
                        );
                        Rc::new(|| Ok(Value::Undefined))
                    }
                };
                (evaluator, options.label.unwrap_or(path))
            }
        };

        debug!(subscriber = %id, expression = %expression, lazy = options.lazy, "create watcher");
        Self(Rc::new_cyclic(|this| WatcherInner {
            id,
            expression,
            evaluator,
            callback,
            deep: options.deep,
            user: options.user,
            lazy: options.lazy,
            sync: options.sync,
            before: options.before,
            after: options.after,
            value: RefCell::new(Value::Undefined),
            deps: RefCell::new(SmallVec::new()),
            dep_ids: RefCell::new(HashSet::new()),
            new_deps: RefCell::new(SmallVec::new()),
            new_dep_ids: RefCell::new(HashSet::new()),
            active: Cell::new(true),
            dirty: Cell::new(options.lazy),
            own_dep: options.lazy.then(Dep::new),
            this: this.clone(),
        }))
    }

    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    pub fn expression(&self) -> &str {
        &self.0.expression
    }

    /// The cached value from the last evaluation.
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Number of publishers read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    /// Whether the last run read `dep`.
    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.0.dep_ids.borrow().contains(&dep.id())
    }

    /// The publisher of a lazy watcher's own value.
    pub fn own_dep(&self) -> Option<&Dep> {
        self.0.own_dep.as_ref()
    }

    /// Re-evaluate and fire the callback if the value changed.
    pub fn run(&self) -> Result<()> {
        self.0.rerun()
    }

    /// Re-evaluate if dirty and return the value.
    pub fn evaluate(&self) -> Result<Value> {
        self.0.evaluate()
    }

    /// Link the active subscriber to this watcher's own value.
    pub fn depend(&self) {
        self.0.depend();
    }

    /// React to a dependency change as if a publisher had notified.
    pub fn update(&self) {
        Subscriber::update(&*self.0);
    }

    /// Unlink from every publisher and stop. Idempotent.
    pub fn teardown(&self) {
        self.0.teardown();
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.0.id)
            .field("expression", &self.0.expression)
            .field("active", &self.0.active.get())
            .field("dirty", &self.0.dirty.get())
            .field("deps", &self.0.deps.borrow().len())
            .finish()
    }
}
