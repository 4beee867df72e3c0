//! Dynamic values and tracked objects.
//!
//! Application data enters the runtime as [`Value`]s. Containers
//! ([`Object`], [`Array`]) are reference handles: cloning a `Value::Object`
//! aliases the same object, just as two variables can point at one object
//! in a dynamic language. Tracking instruments a container in place, so
//! every alias observes the same cells.
//!
//! # Properties
//!
//! An object property is one of:
//!
//! - plain data, which is what untracked objects hold;
//! - fixed data, which is non-configurable and never instrumented;
//! - an accessor, a user-supplied getter and/or setter;
//! - a [`ReactiveCell`], installed by the tracker.
//!
//! Reads and writes always go through [`Object::get`] and [`Object::set`],
//! which route to the cell when there is one.

use std::any::Any;
use std::borrow::Cow;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::array::Array;
use super::cell::ReactiveCell;
use super::context::ReactiveContext;
use super::observer::Observer;

/// Getter half of an accessor property.
pub type Getter = Rc<dyn Fn() -> Value>;

/// Setter half of an accessor property.
pub type Setter = Rc<dyn Fn(Value)>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Array(Array),
    /// A framework-internal instance. Never tracked.
    Opaque(Opaque),
}

impl Value {
    /// `===` semantics: primitives by value (so `NaN !== NaN`), everything
    /// else by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }

    /// Strict equality, except that two `NaN`s count as the same value.
    pub fn same_value(&self, other: &Value) -> bool {
        self.strict_eq(other) || (self.is_nan() && other.is_nan())
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for every reference type: objects, arrays and opaque values.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_) | Value::Opaque(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Opaque(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Opaque(_) => "internal instance",
        }
    }

    /// The tracker attached to this value, if it is a tracked container.
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Value::Object(object) => object.observer(),
            Value::Array(array) => array.observer(),
            _ => None,
        }
    }

    /// Member access: `value[key]`.
    ///
    /// Objects read the property, arrays understand indices and `length`,
    /// strings understand `length`. Anything else yields `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(object) => object.get(key),
            Value::Array(array) => match key {
                "length" => Value::from(array.len()),
                _ => match parse_index(key) {
                    Some(index) => array.get(index),
                    None => Value::Undefined,
                },
            },
            Value::String(s) if key == "length" => Value::from(s.chars().count()),
            _ => Value::Undefined,
        }
    }

    /// Untracked snapshot as JSON. `Undefined` fields are skipped and
    /// non-finite numbers become `null`.
    ///
    /// Containers that reference themselves are not supported.
    pub fn to_json(&self) -> serde_json::Value {
        ReactiveContext::untracked(|| self.to_json_inner())
    }

    fn to_json_inner(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(object) => {
                let mut map = serde_json::Map::new();
                for key in object.raw_keys() {
                    let value = object.get(&key);
                    if !value.is_undefined() {
                        map.insert(key, value.to_json_inner());
                    }
                }
                serde_json::Value::Object(map)
            }
            Value::Array(array) => {
                serde_json::Value::Array(array.to_vec().iter().map(Value::to_json_inner).collect())
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(object) => fmt::Debug::fmt(object, f),
            Value::Array(array) => fmt::Debug::fmt(array, f),
            Value::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl From<serde_json::Value> for Value {
    /// Builds plain, untracked containers.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Handle to a framework-internal instance.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

/// Property key for [`crate::reactive::set`] and [`crate::reactive::delete`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl Key {
    /// The key as a property name.
    pub fn as_name(&self) -> Cow<'_, str> {
        match self {
            Key::Name(name) => Cow::Borrowed(name),
            Key::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    /// The key as an array index, if it is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Name(name) => parse_index(name),
            Key::Index(index) => Some(*index),
        }
    }
}

/// Parse a canonical decimal index: digits only, no leading zero except `"0"`.
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    key.parse().ok()
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// A user-defined accessor property.
#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Getter>,
    pub set: Option<Setter>,
}

#[derive(Clone)]
pub(crate) enum Property {
    Data(Value),
    Fixed(Value),
    Accessor(Accessor),
    Reactive(Rc<ReactiveCell>),
}

struct ObjectInner {
    props: RefCell<IndexMap<String, Property>>,
    observer: OnceCell<Rc<Observer>>,
    extensible: Cell<bool>,
    internal: bool,
}

/// A reference-counted object with insertion-ordered properties.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    pub fn new() -> Self {
        Self::with_flags(false)
    }

    /// An object owned by the framework itself (a component instance, for
    /// example). The tracker refuses to instrument it.
    pub fn internal() -> Self {
        Self::with_flags(true)
    }

    fn with_flags(internal: bool) -> Self {
        Self(Rc::new(ObjectInner {
            props: RefCell::new(IndexMap::new()),
            observer: OnceCell::new(),
            extensible: Cell::new(true),
            internal,
        }))
    }

    /// Read a property.
    ///
    /// Reactive properties link the active subscriber. Reading a key that
    /// does not exist links it to the object's structure instead, so a later
    /// [`crate::reactive::set`] of that key re-runs it.
    pub fn get(&self, key: &str) -> Value {
        match self.property(key) {
            Some(Property::Reactive(cell)) => cell.get(),
            Some(Property::Accessor(accessor)) => accessor
                .get
                .map(|getter| getter())
                .unwrap_or(Value::Undefined),
            Some(Property::Data(value)) | Some(Property::Fixed(value)) => value,
            None => {
                self.depend_structure();
                Value::Undefined
            }
        }
    }

    /// Plain assignment: `object[key] = value`.
    ///
    /// Existing reactive properties notify. A new key becomes a plain,
    /// non-reactive property; use [`crate::reactive::set`] to add a reactive
    /// one.
    pub fn set(&self, key: &str, value: Value) {
        match self.property(key) {
            Some(Property::Reactive(cell)) => cell.set(value),
            Some(Property::Accessor(accessor)) => {
                if let Some(setter) = accessor.set {
                    setter(value);
                }
            }
            Some(Property::Fixed(_)) => {}
            Some(Property::Data(_)) => self.put_property(key, Property::Data(value)),
            None => {
                if self.is_extensible() {
                    self.put_property(key, Property::Data(value));
                }
            }
        }
    }

    /// Define a plain data property, replacing whatever was there.
    pub fn define(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.put_property(&key.into(), Property::Data(value.into()));
        self
    }

    /// Define a non-configurable data property. The tracker leaves it alone.
    pub fn define_fixed(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.put_property(&key.into(), Property::Fixed(value.into()));
        self
    }

    /// Define an accessor property.
    pub fn define_accessor(&self, key: impl Into<String>, accessor: Accessor) -> &Self {
        self.put_property(&key.into(), Property::Accessor(accessor));
        self
    }

    /// Raw `delete object[key]`. Does not notify.
    pub fn remove(&self, key: &str) -> bool {
        self.0.props.borrow_mut().shift_remove(key).is_some()
    }

    /// Own-key check without linking.
    pub fn has_own(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    /// Own-key check that links the active subscriber to the object's structure.
    pub fn contains_key(&self, key: &str) -> bool {
        self.depend_structure();
        self.has_own(key)
    }

    /// Own keys in insertion order. Links the active subscriber to the
    /// object's structure.
    pub fn keys(&self) -> Vec<String> {
        self.depend_structure();
        self.raw_keys()
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forbid adding new properties. Also stops the tracker from
    /// instrumenting this object.
    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    pub fn is_internal(&self) -> bool {
        self.0.internal
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The reactive cell behind `key`, if it has been instrumented.
    pub fn cell(&self, key: &str) -> Option<Rc<ReactiveCell>> {
        match self.property(key) {
            Some(Property::Reactive(cell)) => Some(cell),
            _ => None,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn raw_keys(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    pub(crate) fn property(&self, key: &str) -> Option<Property> {
        self.0.props.borrow().get(key).cloned()
    }

    pub(crate) fn put_property(&self, key: &str, property: Property) {
        let mut props = self.0.props.borrow_mut();
        match props.get_mut(key) {
            Some(slot) => *slot = property,
            None => {
                props.insert(key.to_string(), property);
            }
        }
    }

    /// Attach `observer` unless one is already attached; returns the one in place.
    pub(crate) fn attach_observer(&self, observer: Rc<Observer>) -> Rc<Observer> {
        self.0.observer.get_or_init(|| observer).clone()
    }

    fn depend_structure(&self) {
        if ReactiveContext::is_active() {
            if let Some(observer) = self.observer() {
                observer.dep().depend();
            }
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.define(key, value);
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("keys", &self.raw_keys())
            .field("tracked", &self.observer().is_some())
            .finish()
    }
}
