//! Property-based invariant tests for tracking and scheduling.
//!
//! 1. A flush runs watchers in creation order, whatever order they were
//!    notified in
//! 2. A watcher notified any number of times before a flush runs once
//! 3. Writing a value equal to the current one never notifies
//! 4. A user watcher sees the last value written before the flush
//! 5. Array mutations keep the tracked array equal to a plain `Vec` model

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use ripple_core::{mount, reactive, set, watch_path, LifecycleHooks, Runtime, Value, WatchOptions};
use serde_json::json;

fn keyed_state(n: usize) -> Value {
    let mut map = serde_json::Map::new();
    for i in 0..n {
        map.insert(format!("k{i}"), json!(0));
    }
    reactive(serde_json::Value::Object(map))
}

proptest! {
    #[test]
    fn flush_order_follows_creation_order(
        order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let state = keyed_state(8);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut views = Vec::new();
        for i in 0..8usize {
            let read = state.clone();
            let sink = log.clone();
            views.push(mount(
                move || {
                    read.get(&format!("k{i}"));
                    sink.borrow_mut().push(i);
                    Ok(Value::Null)
                },
                |_| Ok(()),
                LifecycleHooks::default(),
            ).unwrap());
        }
        log.borrow_mut().clear();

        for &i in &order {
            set(&state, format!("k{i}"), Value::from(1));
        }
        Runtime::run_until_idle();

        prop_assert_eq!(log.borrow().clone(), (0..8).collect::<Vec<_>>());
        for view in &views {
            view.destroy();
        }
    }

    #[test]
    fn repeated_notifications_run_once(writes in 1usize..20) {
        let state = keyed_state(1);
        let runs = Rc::new(RefCell::new(0usize));
        let counter = runs.clone();
        let read = state.clone();
        let view = mount(
            move || {
                read.get("k0");
                *counter.borrow_mut() += 1;
                Ok(Value::Null)
            },
            |_| Ok(()),
            LifecycleHooks::default(),
        ).unwrap();

        for n in 0..writes {
            set(&state, "k0", Value::from(n + 1));
        }
        Runtime::run_until_idle();
        prop_assert_eq!(*runs.borrow(), 2);
        view.destroy();
    }

    #[test]
    fn equal_writes_never_notify(value in any::<i32>()) {
        let state = reactive(json!({ "k": value }));
        let calls = Rc::new(RefCell::new(0usize));
        let counter = calls.clone();
        let handle = watch_path(
            &state,
            "k",
            move |_, _| {
                *counter.borrow_mut() += 1;
                Ok(())
            },
            WatchOptions { sync: true, ..WatchOptions::default() },
        ).unwrap();

        set(&state, "k", Value::from(value));
        set(&state, "k", Value::from(value));
        prop_assert_eq!(*calls.borrow(), 0);
        handle.unwatch();
    }

    #[test]
    fn watcher_sees_last_write(values in proptest::collection::vec(-1000i32..1000, 1..10)) {
        let state = reactive(json!({ "k": 5000 }));
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let handle = watch_path(
            &state,
            "k",
            move |new, old| {
                sink.borrow_mut().push((new.clone(), old.clone()));
                Ok(())
            },
            WatchOptions::default(),
        ).unwrap();

        for &v in &values {
            set(&state, "k", Value::from(v));
        }
        Runtime::run_until_idle();

        let last = *values.last().unwrap_or(&5000);
        prop_assert_eq!(calls.borrow().clone(), vec![(Value::from(last), Value::from(5000))]);
        handle.unwatch();
    }

    #[test]
    fn array_mutations_match_vec_model(
        ops in proptest::collection::vec((0u8..5, 0usize..6, -50i32..50), 0..30)
    ) {
        let list = reactive(json!([]));
        let array = list.as_array().unwrap().clone();
        let mut model: Vec<i32> = Vec::new();

        for (op, index, value) in ops {
            match op {
                0 => {
                    array.push(value);
                    model.push(value);
                }
                1 => {
                    array.pop();
                    model.pop();
                }
                2 => {
                    array.shift();
                    if !model.is_empty() {
                        model.remove(0);
                    }
                }
                3 => {
                    array.unshift(vec![Value::from(value)]);
                    model.insert(0, value);
                }
                _ => {
                    array.splice(index, 1, vec![Value::from(value)]);
                    let start = index.min(model.len());
                    let end = (start + 1).min(model.len());
                    let _removed: Vec<i32> = model.splice(start..end, [value]).collect();
                }
            }
        }

        let actual: Vec<f64> = array.to_vec().iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect();
        let expected: Vec<f64> = model.iter().map(|&v| f64::from(v)).collect();
        prop_assert_eq!(actual, expected);
    }
}
