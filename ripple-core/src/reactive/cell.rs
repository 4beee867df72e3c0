//! Reactive Cell Implementation
//!
//! A `ReactiveCell` replaces one property of a tracked object. It owns the
//! property's publisher and is the only way the property is read or written
//! once the object is tracked.
//!
//! # How Cells Work
//!
//! 1. Reading a cell while a subscriber is active links the subscriber to the
//!    cell's dep. If the value is a tracked container, the subscriber is also
//!    linked to the container's own dep, and for arrays to every element's
//!    dep, since element reads cannot be intercepted individually.
//!
//! 2. Writing a value that is the same as the current one (`NaN` included)
//!    does nothing. Otherwise the value is stored (or forwarded to a
//!    preserved setter), re-tracked, and the dep notifies.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{depend_array, track, Observer};
use super::value::{Getter, Object, Property, Setter, Value};

pub struct ReactiveCell {
    dep: Dep,

    /// Shadow slot. Unused when a preserved getter supplies the value.
    value: RefCell<Value>,

    getter: Option<Getter>,
    setter: Option<Setter>,

    /// Tracker of the current value, when it is a tracked container.
    child: RefCell<Option<Rc<Observer>>>,

    shallow: bool,
}

impl ReactiveCell {
    fn new(value: Value, getter: Option<Getter>, setter: Option<Setter>, shallow: bool) -> Self {
        let child = if shallow { None } else { track(&value, false) };
        Self {
            dep: Dep::new(),
            value: RefCell::new(value),
            getter,
            setter,
            child: RefCell::new(child),
            shallow,
        }
    }

    /// The cell's publisher.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Read the value, linking the active subscriber.
    pub fn get(&self) -> Value {
        let value = self.current();
        if ReactiveContext::is_active() {
            self.dep.depend();
            let child = self.child.borrow().clone();
            if let Some(child) = child {
                child.dep().depend();
                if let Value::Array(items) = &value {
                    depend_array(items);
                }
            }
        }
        value
    }

    /// Read the value without linking anything.
    pub fn get_untracked(&self) -> Value {
        ReactiveContext::untracked(|| self.current())
    }

    /// Write the value and notify subscribers if it changed.
    pub fn set(&self, new_value: Value) {
        let current = self.current();
        if new_value.same_value(&current) {
            return;
        }
        // A getter without a setter is read-only.
        if self.getter.is_some() && self.setter.is_none() {
            return;
        }
        match &self.setter {
            Some(setter) => setter(new_value.clone()),
            None => *self.value.borrow_mut() = new_value.clone(),
        }
        let child = if self.shallow {
            None
        } else {
            track(&new_value, false)
        };
        *self.child.borrow_mut() = child;
        self.dep.notify();
    }

    fn current(&self) -> Value {
        match &self.getter {
            Some(getter) => getter(),
            None => self.value.borrow().clone(),
        }
    }
}

impl fmt::Debug for ReactiveCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("dep", &self.dep)
            .field("value", &self.get_untracked())
            .field("shallow", &self.shallow)
            .finish()
    }
}

/// Turn `object[key]` into a reactive property.
///
/// Non-configurable properties are left alone. An existing accessor (or an
/// existing cell) is preserved and wrapped. When `initial` is `None` the
/// property's current value is used, except for getter-only accessors,
/// which never get a shadow value.
pub fn define_reactive(object: &Object, key: &str, initial: Option<Value>, shallow: bool) {
    let existing = object.property(key);
    let (getter, setter): (Option<Getter>, Option<Setter>) = match &existing {
        Some(Property::Fixed(_)) => return,
        Some(Property::Accessor(accessor)) => (accessor.get.clone(), accessor.set.clone()),
        Some(Property::Reactive(cell)) => {
            let (read, write) = (cell.clone(), cell.clone());
            (
                Some(Rc::new(move || read.get())),
                Some(Rc::new(move |value| write.set(value))),
            )
        }
        Some(Property::Data(_)) | None => (None, None),
    };

    let value = match initial {
        Some(value) => value,
        None if getter.is_none() || setter.is_some() => match existing {
            Some(Property::Data(value)) => value,
            Some(_) => ReactiveContext::untracked(|| object.get(key)),
            None => Value::Undefined,
        },
        None => Value::Undefined,
    };

    let cell = ReactiveCell::new(value, getter, setter, shallow);
    object.put_property(key, Property::Reactive(Rc::new(cell)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::dep::Dep;
    use crate::reactive::subscriber::{Subscriber, SubscriberId};
    use crate::reactive::value::Accessor;
    use std::cell::Cell;

    struct Counter {
        id: SubscriberId,
        updates: Cell<usize>,
        this: std::rc::Weak<Counter>,
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

    fn object_with(key: &str, value: Value) -> Object {
        let object = Object::new();
        object.define(key, value);
        define_reactive(&object, key, None, false);
        object
    }

    #[test]
    fn equal_writes_do_not_notify() {
        let object = object_with("k", Value::from(1));
        let counter = Counter::new();
        counter.read(|| {
            object.get("k");
        });

        object.set("k", Value::from(2));
        object.set("k", Value::from(2));
        assert_eq!(counter.updates.get(), 1);
    }

    #[test]
    fn nan_writes_do_not_renotify() {
        let object = object_with("k", Value::from(0));
        let counter = Counter::new();
        counter.read(|| {
            object.get("k");
        });

        object.set("k", Value::Number(f64::NAN));
        object.set("k", Value::Number(f64::NAN));
        assert_eq!(counter.updates.get(), 1);
    }

    #[test]
    fn reading_a_container_links_its_structure() {
        let list = Value::from(serde_json::json!([[1], { "x": 1 }]));
        let object = object_with("list", list.clone());
        let counter = Counter::new();
        counter.read(|| {
            object.get("list");
        });

        let outer = list.observer().unwrap();
        let nested = list.get("0").observer().unwrap();
        let element = list.get("1").observer().unwrap();
        assert!(outer.dep().has_subscriber(counter.id));
        assert!(nested.dep().has_subscriber(counter.id));
        assert!(element.dep().has_subscriber(counter.id));
    }

    #[test]
    fn new_container_values_are_tracked() {
        let object = object_with("k", Value::Null);
        let replacement = Value::from(serde_json::json!({ "a": 1 }));
        object.set("k", replacement.clone());
        assert!(replacement.observer().is_some());
    }

    #[test]
    fn shallow_cells_do_not_track_values() {
        let object = Object::new();
        let value = Value::from(serde_json::json!({ "a": 1 }));
        define_reactive(&object, "k", Some(value.clone()), true);
        assert!(value.observer().is_none());
    }

    #[test]
    fn fixed_properties_are_skipped() {
        let object = Object::new();
        object.define_fixed("k", 1);
        define_reactive(&object, "k", None, false);
        assert!(object.cell("k").is_none());
    }

    #[test]
    fn preserved_setter_receives_writes() {
        let store = Rc::new(RefCell::new(Value::from(1)));
        let (read, write) = (store.clone(), store.clone());
        let object = Object::new();
        object.define_accessor(
            "k",
            Accessor {
                get: Some(Rc::new(move || read.borrow().clone())),
                set: Some(Rc::new(move |value| *write.borrow_mut() = value)),
            },
        );
        define_reactive(&object, "k", None, false);

        let counter = Counter::new();
        counter.read(|| {
            object.get("k");
        });
        object.set("k", Value::from(5));

        assert_eq!(*store.borrow(), Value::from(5));
        assert_eq!(object.get("k"), Value::from(5));
        assert_eq!(counter.updates.get(), 1);
    }

    #[test]
    fn getter_only_properties_are_read_only() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let object = Object::new();
        object.define_accessor(
            "k",
            Accessor {
                get: Some(Rc::new(move || {
                    seen.set(seen.get() + 1);
                    Value::from(42)
                })),
                set: None,
            },
        );
        define_reactive(&object, "k", None, false);
        // No shadow value was read at definition time.
        assert_eq!(calls.get(), 0);

        let counter = Counter::new();
        counter.read(|| {
            assert_eq!(object.get("k"), Value::from(42));
        });
        object.set("k", Value::from(1));
        assert_eq!(counter.updates.get(), 0);
        assert_eq!(object.get("k"), Value::from(42));
    }

    #[test]
    fn redefining_wraps_the_existing_cell() {
        let object = object_with("k", Value::from(1));
        let inner = object.cell("k").unwrap();
        define_reactive(&object, "k", None, false);

        let counter = Counter::new();
        counter.read(|| {
            object.get("k");
        });
        object.set("k", Value::from(2));

        assert_eq!(inner.get_untracked(), Value::from(2));
        // Both the wrapped and the wrapping cell notify.
        assert_eq!(counter.updates.get(), 2);
    }
}
