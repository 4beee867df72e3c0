//! Deep reads for `deep` watchers.
//!
//! Walking a value with tracked reads links the active subscriber to every
//! nested cell and container, so a change anywhere below the root re-runs it.

use std::collections::HashSet;

use super::value::Value;

/// Read every nested property of `value` in the active context.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Object(object) => {
            if !object.is_extensible() {
                return;
            }
            if object.observer().is_some() && !seen.insert(object.addr()) {
                return;
            }
            for key in object.keys() {
                walk(&object.get(&key), seen);
            }
        }
        Value::Array(array) => {
            if !array.is_extensible() {
                return;
            }
            if array.observer().is_some() && !seen.insert(array.addr()) {
                return;
            }
            for item in array.to_vec() {
                walk(&item, seen);
            }
        }
        _ => {}
    }
}
