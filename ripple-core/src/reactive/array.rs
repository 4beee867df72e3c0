//! Tracked lists.
//!
//! Index writes on a plain list cannot be intercepted field by field, so
//! arrays are tracked as a whole: the array's tracker owns one publisher,
//! every read through [`Array`] links to it, and the seven mutating
//! operations (`push`, `pop`, `shift`, `unshift`, `splice`, `sort_by`,
//! `reverse`) notify it after mutating. Newly inserted elements are tracked
//! before the notification goes out.
//!
//! An array that was never tracked behaves like a plain `Vec`.

use std::cell::{Cell, OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::observer::{track, Observer};
use super::value::Value;

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    observer: OnceCell<Rc<Observer>>,
    extensible: Cell<bool>,
}

/// A reference-counted list of values.
#[derive(Clone)]
pub struct Array(Rc<ArrayInner>);

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayInner {
            items: RefCell::new(items),
            observer: OnceCell::new(),
            extensible: Cell::new(true),
        }))
    }

    pub fn len(&self) -> usize {
        self.depend_structure();
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or `Undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.depend_structure();
        self.0
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.depend_structure();
        self.0.items.borrow().clone()
    }

    /// Append and return the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        let inserted = [value.clone()];
        self.mutate(&inserted, |items| {
            items.push(value);
            items.len()
        })
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(&[], |items| items.pop())
    }

    pub fn shift(&self) -> Option<Value> {
        self.mutate(&[], |items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })
    }

    /// Prepend `values` (keeping their order) and return the new length.
    pub fn unshift(&self, values: Vec<Value>) -> usize {
        self.mutate(&values.clone(), |items| {
            let mut merged = values;
            merged.append(items);
            *items = merged;
            items.len()
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert `values`
    /// in their place. Out-of-range arguments are clamped. Returns the
    /// removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, values: Vec<Value>) -> Vec<Value> {
        self.mutate(&values.clone(), |items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, values).collect()
        })
    }

    /// Sort in place. The comparator runs on a snapshot, so it may read
    /// reactive data, this array included. If it panics the array is left
    /// untouched.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut items = self.0.items.borrow().clone();
        items.sort_by(compare);
        *self.0.items.borrow_mut() = items;
        self.notify_mutation(&[]);
    }

    pub fn reverse(&self) {
        self.mutate(&[], |items| items.reverse());
    }

    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Elements without linking the active subscriber.
    pub(crate) fn raw_items(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Raw `length = max(length, len)`: pads with `Undefined`, never notifies.
    pub(crate) fn pad_to(&self, len: usize) {
        let mut items = self.0.items.borrow_mut();
        if items.len() < len {
            items.resize(len, Value::Undefined);
        }
    }

    pub(crate) fn attach_observer(&self, observer: Rc<Observer>) -> Rc<Observer> {
        self.0.observer.get_or_init(|| observer).clone()
    }

    fn mutate<R>(&self, inserted: &[Value], op: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let result = op(&mut self.0.items.borrow_mut());
        self.notify_mutation(inserted);
        result
    }

    fn notify_mutation(&self, inserted: &[Value]) {
        if let Some(observer) = self.observer() {
            for value in inserted {
                track(value, false);
            }
            observer.dep().notify();
        }
    }

    fn depend_structure(&self) {
        if ReactiveContext::is_active() {
            if let Some(observer) = self.observer() {
                observer.dep().depend();
            }
        }
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.0.items.borrow().len())
            .field("tracked", &self.observer().is_some())
            .finish()
    }
}
