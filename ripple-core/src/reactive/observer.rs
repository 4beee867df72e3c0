//! Tracker Implementation
//!
//! An `Observer` is attached to every tracked container. It owns the
//! container's structural publisher, which fires when keys are added or
//! removed through [`set`] and [`delete`] and when an array mutator runs.
//!
//! Tracking is idempotent: a container that already has an observer keeps
//! it, so two paths to the same object share one set of cells.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::array::Array;
use super::cell::define_reactive;
use super::dep::Dep;
use super::runtime::warn;
use super::value::{Key, Value};
use crate::error::ReactiveError;

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Turn instrumentation of new containers on or off for this thread.
///
/// Containers that are already tracked are unaffected.
pub fn toggle_observing(value: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(value));
}

pub fn is_observing() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Guard that disables observing and restores the previous state on drop.
pub struct ObservingPaused {
    previous: bool,
}

impl ObservingPaused {
    pub fn new() -> Self {
        let previous = is_observing();
        toggle_observing(false);
        Self { previous }
    }
}

impl Default for ObservingPaused {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObservingPaused {
    fn drop(&mut self) {
        toggle_observing(self.previous);
    }
}

/// Disable observing until the returned guard is dropped.
pub fn pause_observing() -> ObservingPaused {
    ObservingPaused::new()
}

/// Per-container tracker.
pub struct Observer {
    dep: Dep,
    root_count: Cell<usize>,
}

impl Observer {
    fn new() -> Self {
        Self {
            dep: Dep::new(),
            root_count: Cell::new(0),
        }
    }

    /// Structural publisher of the container.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// How many owners use the container as their root data.
    pub fn root_count(&self) -> usize {
        self.root_count.get()
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep)
            .field("root_count", &self.root_count.get())
            .finish()
    }
}

/// Track `value` and return its observer.
///
/// Primitives, opaque values, internal objects and non-extensible
/// containers are never instrumented. While observing is paused only
/// existing observers are returned.
pub fn track(value: &Value, as_root: bool) -> Option<Rc<Observer>> {
    let observer = match value {
        Value::Object(object) => match object.observer() {
            Some(observer) => observer,
            None => {
                if !is_observing() || !object.is_extensible() || object.is_internal() {
                    return None;
                }
                // Attach before walking so cycles find the observer.
                let observer = object.attach_observer(Rc::new(Observer::new()));
                for key in object.raw_keys() {
                    define_reactive(object, &key, None, false);
                }
                observer
            }
        },
        Value::Array(array) => match array.observer() {
            Some(observer) => observer,
            None => {
                if !is_observing() || !array.is_extensible() {
                    return None;
                }
                let observer = array.attach_observer(Rc::new(Observer::new()));
                for item in array.raw_items() {
                    track(&item, false);
                }
                observer
            }
        },
        _ => return None,
    };
    if as_root {
        observer.root_count.set(observer.root_count.get() + 1);
    }
    Some(observer)
}

/// Build a tracked value from JSON.
pub fn reactive(json: serde_json::Value) -> Value {
    let value = Value::from(json);
    track(&value, false);
    value
}

/// Add or replace a property, making new keys reactive.
///
/// Array index keys replace the element (padding with `Undefined` when the
/// index is past the end). Existing keys are assigned. New keys on a tracked
/// container become reactive and the container's publisher notifies.
/// Primitives, internal objects and root data are refused with a warning.
pub fn set(target: &Value, key: impl Into<Key>, value: Value) -> Value {
    let key = key.into();
    match target {
        Value::Array(array) => match key.as_index() {
            Some(index) => {
                array.pad_to(index);
                array.splice(index, 1, vec![value.clone()]);
            }
            None => warn(ReactiveError::InvalidTarget {
                operation: "set",
                target: format!("array key \"{}\"", key.as_name()),
            }),
        },
        Value::Object(object) => {
            let name = key.as_name();
            if object.has_own(&name) {
                object.set(&name, value.clone());
                return value;
            }
            let observer = object.observer();
            if object.is_internal() || observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
                warn(ReactiveError::InvalidTarget {
                    operation: "add",
                    target: "an internal instance or its root data".to_string(),
                });
                return value;
            }
            match observer {
                None => object.set(&name, value.clone()),
                Some(observer) => {
                    debug!(key = %name, "add reactive property");
                    define_reactive(object, &name, Some(value.clone()), false);
                    observer.dep().notify();
                }
            }
        }
        other => warn(ReactiveError::InvalidTarget {
            operation: "set",
            target: format!("{} value", other.type_name()),
        }),
    }
    value
}

/// Remove a property, notifying the container's publisher.
pub fn delete(target: &Value, key: impl Into<Key>) {
    let key = key.into();
    match target {
        Value::Array(array) => match key.as_index() {
            Some(index) => {
                array.splice(index, 1, Vec::new());
            }
            None => warn(ReactiveError::InvalidTarget {
                operation: "delete",
                target: format!("array key \"{}\"", key.as_name()),
            }),
        },
        Value::Object(object) => {
            let observer = object.observer();
            if object.is_internal() || observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
                warn(ReactiveError::InvalidTarget {
                    operation: "delete",
                    target: "an internal instance or its root data".to_string(),
                });
                return;
            }
            let name = key.as_name();
            if !object.remove(&name) {
                return;
            }
            if let Some(observer) = observer {
                observer.dep().notify();
            }
        }
        other => warn(ReactiveError::InvalidTarget {
            operation: "delete",
            target: format!("{} value", other.type_name()),
        }),
    }
}

/// Link the active subscriber to every element container of `array`.
pub(crate) fn depend_array(array: &Array) {
    for item in array.raw_items() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::context::ReactiveContext;
    use crate::reactive::dep::Dep;
    use crate::reactive::subscriber::{Subscriber, SubscriberId};
    use crate::reactive::value::Object;
    use serde_json::json;
    use std::rc::Weak;

    struct Counter {
        id: SubscriberId,
        updates: Cell<usize>,
        this: Weak<Counter>,
    }

    impl Counter {
        fn new() -> Rc<Self> {
            Rc::new_cyclic(|this| Self {
                id: SubscriberId::new(),
                updates: Cell::new(0),
                this: this.clone(),
            })
        }

        fn read(self: &Rc<Self>, f: impl FnOnce()) {
            let _ctx = ReactiveContext::enter(self.clone());
            f();
        }
    }

    impl Subscriber for Counter {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn add_dep(&self, dep: &Dep) {
            if let Some(this) = self.this.upgrade() {
                dep.add_sub(this);
            }
        }

        fn update(&self) {
            self.updates.set(self.updates.get() + 1);
        }
    }

    #[test]
    fn tracking_is_idempotent() {
        let value = Value::from(json!({ "a": 1 }));
        let first = track(&value, false).unwrap();
        let second = track(&value, true).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.root_count(), 1);
        assert!(value.as_object().unwrap().cell("a").is_some());
    }

    #[test]
    fn primitives_internal_and_frozen_values_are_skipped() {
        assert!(track(&Value::from(1), false).is_none());
        assert!(track(&Value::Object(Object::internal()), false).is_none());

        let frozen = Object::new();
        frozen.prevent_extensions();
        assert!(track(&Value::Object(frozen), false).is_none());
    }

    #[test]
    fn cyclic_objects_track_once() {
        let object = Object::new();
        object.define("me", Value::Object(object.clone()));
        let value = Value::Object(object.clone());
        let observer = track(&value, false).unwrap();
        assert!(Rc::ptr_eq(&observer, &object.observer().unwrap()));
    }

    #[test]
    fn paused_observing_skips_new_containers() {
        let value = Value::from(json!({ "a": 1 }));
        {
            let _paused = pause_observing();
            assert!(track(&value, false).is_none());
        }
        assert!(is_observing());
        assert!(track(&value, false).is_some());
    }

    #[test]
    fn set_new_key_is_reactive_and_notifies_structure() {
        let value = reactive(json!({ "a": 1 }));
        let counter = Counter::new();
        counter.read(|| {
            value.get("b");
        });

        set(&value, "b", Value::from(2));
        assert_eq!(counter.updates.get(), 1);
        assert!(value.as_object().unwrap().cell("b").is_some());

        counter.read(|| {
            value.get("b");
        });
        value.as_object().unwrap().set("b", Value::from(3));
        assert_eq!(counter.updates.get(), 2);
    }

    #[test]
    fn set_existing_key_assigns() {
        let value = reactive(json!({ "a": 1 }));
        set(&value, "a", Value::from(5));
        assert_eq!(value.get("a"), Value::from(5));
    }

    #[test]
    fn set_refuses_root_data_and_primitives() {
        let value = Value::from(json!({ "a": 1 }));
        track(&value, true);
        set(&value, "b", Value::from(2));
        assert!(!value.as_object().unwrap().has_own("b"));

        let result = set(&Value::from(1), "x", Value::from(2));
        assert_eq!(result, Value::from(2));
    }

    #[test]
    fn set_on_untracked_object_is_plain_assignment() {
        let value = Value::Object(Object::new());
        set(&value, "a", Value::from(1));
        assert_eq!(value.get("a"), Value::from(1));
        assert!(value.as_object().unwrap().cell("a").is_none());
    }

    #[test]
    fn array_index_set_pads_and_notifies() {
        let value = reactive(json!([1]));
        let counter = Counter::new();
        counter.read(|| {
            value.get("length");
        });

        set(&value, 3usize, Value::from(4));
        let items = value.as_array().unwrap().raw_items();
        assert_eq!(items.len(), 4);
        assert!(items[1].is_undefined());
        assert_eq!(items[3], Value::from(4));
        assert_eq!(counter.updates.get(), 1);

        set(&value, 0usize, Value::from(9));
        assert_eq!(value.get("0"), Value::from(9));
        assert_eq!(value.get("length"), Value::from(4));
    }

    #[test]
    fn delete_removes_and_notifies() {
        let value = reactive(json!({ "a": 1, "b": 2 }));
        let counter = Counter::new();
        counter.read(|| {
            value.as_object().unwrap().keys();
        });

        delete(&value, "a");
        assert_eq!(value.as_object().unwrap().raw_keys(), vec!["b"]);
        assert_eq!(counter.updates.get(), 1);

        delete(&value, "missing");
        assert_eq!(counter.updates.get(), 1);
    }

    #[test]
    fn delete_array_index_splices() {
        let value = reactive(json!([1, 2, 3]));
        delete(&value, 1usize);
        assert_eq!(value.to_json(), json!([1, 3]));
    }

    #[test]
    fn array_name_keys_must_be_canonical_indices() {
        let value = reactive(json!([1, 2]));
        set(&value, "1", Value::from(5));
        assert_eq!(value.to_json(), json!([1, 5]));

        set(&value, "01", Value::from(9));
        set(&value, "+0", Value::from(9));
        delete(&value, "x");
        assert_eq!(value.to_json(), json!([1, 5]));
    }

    #[test]
    fn depend_array_links_nested_containers() {
        let value = reactive(json!([[1], { "x": 1 }, 3]));
        let counter = Counter::new();
        counter.read(|| depend_array(value.as_array().unwrap()));

        let nested = value.as_array().unwrap().raw_items();
        assert!(nested[0].observer().unwrap().dep().has_subscriber(counter.id));
        assert!(nested[1].observer().unwrap().dep().has_subscriber(counter.id));
    }
}
