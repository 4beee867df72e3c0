//! Computed Values
//!
//! A `Computed` is a cached derived value backed by a lazy watcher.
//!
//! # How Computed Values Work
//!
//! 1. Creation does not evaluate anything. The value starts dirty.
//!
//! 2. Reading runs the getter if the value is dirty, caches the result, and
//!    links the reader (if any) to the computed's own publisher.
//!
//! 3. When a dependency changes and nobody is linked to the computed, it
//!    only marks itself dirty; the getter runs on the next read. If someone
//!    is linked, it recomputes right away and notifies them only when the
//!    value actually changed.
//!
//! An uncached computed skips all of this and calls its getter on every
//! read, so the reader links straight to whatever the getter touches.
//!
//! Handles are shared. When the last one is dropped the watcher is torn
//! down and leaves every publisher it was subscribed to.

use std::fmt;
use std::rc::Rc;

use super::runtime::warn;
use super::subscriber::SubscriberId;
use super::value::Value;
use super::watcher::{Evaluator, WatchSource, Watcher, WatcherOptions};
use crate::error::{ReactiveError, Result};

/// Receives values assigned to a writable computed.
pub type ComputedSetter = Rc<dyn Fn(Value) -> Result<()>>;

/// Tears the watcher down once no handle is left.
struct Owner {
    watcher: Watcher,
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.watcher.teardown();
    }
}

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed {
    owner: Rc<Owner>,
    setter: Option<ComputedSetter>,
    /// Set for uncached computed values.
    direct: Option<Evaluator>,
}

impl Computed {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::named("computed", getter)
    }

    /// Create a computed value with a diagnostic label.
    pub fn named<F>(label: impl Into<String>, getter: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::build(label.into(), Rc::new(getter), None, true)
    }

    /// Create a writable computed value. [`Computed::set`] hands the
    /// assigned value to `setter`.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
        S: Fn(Value) -> Result<()> + 'static,
    {
        Self::build("computed".to_string(), Rc::new(getter), Some(Rc::new(setter)), true)
    }

    /// Create a computed value that never caches.
    pub fn uncached<F>(getter: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::build("computed".to_string(), Rc::new(getter), None, false)
    }

    /// Attach a setter, making this computed writable.
    pub fn setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(Value) -> Result<()> + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self
    }

    fn build(label: String, getter: Evaluator, setter: Option<ComputedSetter>, cache: bool) -> Self {
        let watcher = Watcher::build(
            WatchSource::Getter(getter.clone()),
            None,
            WatcherOptions {
                lazy: true,
                label: Some(label),
                ..WatcherOptions::default()
            },
        );
        Self {
            owner: Rc::new(Owner { watcher }),
            setter,
            direct: (!cache).then_some(getter),
        }
    }

    /// Read the value, evaluating it first if it is dirty.
    pub fn get(&self) -> Result<Value> {
        if let Some(getter) = &self.direct {
            return getter();
        }
        self.watcher().depend();
        self.watcher().evaluate()
    }

    /// Assign through the user setter. Without one the write is dropped
    /// with a warning.
    pub fn set(&self, value: Value) -> Result<()> {
        match &self.setter {
            Some(setter) => setter(value),
            None => {
                warn(ReactiveError::InvalidTarget {
                    operation: "assign",
                    target: format!(
                        "computed \"{}\" without a setter",
                        self.watcher().expression()
                    ),
                });
                Ok(())
            }
        }
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn is_cached(&self) -> bool {
        self.direct.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher().is_dirty()
    }

    pub fn id(&self) -> SubscriberId {
        self.watcher().id()
    }

    pub fn watcher(&self) -> &Watcher {
        &self.owner.watcher
    }

    /// Stop tracking dependencies. The last value stays readable.
    pub fn teardown(&self) {
        self.watcher().teardown();
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.watcher().id())
            .field("dirty", &self.watcher().is_dirty())
            .field("cached", &self.is_cached())
            .field("writable", &self.is_writable())
            .finish()
    }
}
