//! User watch API.
//!
//! `watch` and `watch_path` create user watchers: their getter and callback
//! errors are reported through the runtime's error handler instead of being
//! returned, and the callback fires after the next flush with `(new, old)`.

use std::rc::Rc;

use super::runtime::report_error;
use super::value::Value;
use super::watcher::{Callback, WatchSource, Watcher, WatcherOptions};
use crate::error::{ErrorContext, Result};

/// Options for [`watch`] and [`watch_path`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Also fire for changes anywhere inside the watched value.
    pub deep: bool,
    /// Call the callback once right away with `(value, Undefined)`.
    pub immediate: bool,
    /// Run the callback on the change itself instead of after the flush.
    pub sync: bool,
}

/// Stops a user watcher.
#[must_use = "dropping an Unwatch keeps the watcher running with no way to stop it"]
pub struct Unwatch {
    watcher: Watcher,
}

impl Unwatch {
    pub fn unwatch(self) {
        self.watcher.teardown();
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

/// Watch the value returned by `getter`.
pub fn watch<G, C>(getter: G, callback: C, options: WatchOptions) -> Result<Unwatch>
where
    G: Fn() -> Result<Value> + 'static,
    C: Fn(&Value, &Value) -> Result<()> + 'static,
{
    start(WatchSource::getter(getter), Rc::new(callback), options)
}

/// Watch the dotted `path` under `root`, e.g. `"user.name"`.
pub fn watch_path<C>(root: &Value, path: &str, callback: C, options: WatchOptions) -> Result<Unwatch>
where
    C: Fn(&Value, &Value) -> Result<()> + 'static,
{
    start(
        WatchSource::path(root.clone(), path),
        Rc::new(callback),
        options,
    )
}

fn start(source: WatchSource, callback: Callback, options: WatchOptions) -> Result<Unwatch> {
    let watcher = Watcher::new(
        source,
        Some(callback.clone()),
        WatcherOptions {
            deep: options.deep,
            user: true,
            sync: options.sync,
            ..WatcherOptions::default()
        },
    )?;

    if options.immediate {
        if let Err(err) = callback(&watcher.value(), &Value::Undefined) {
            report_error(
                err,
                ErrorContext::for_subscriber(
                    watcher.id(),
                    format!("callback for immediate watcher \"{}\"", watcher.expression()),
                ),
            );
        }
    }
    Ok(Unwatch { watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;
    use crate::reactive::observer::{reactive, set};
    use crate::reactive::runtime::Runtime;
    use serde_json::json;
    use std::cell::RefCell;

    type Calls = Rc<RefCell<Vec<(Value, Value)>>>;

    fn recorder(calls: &Calls) -> impl Fn(&Value, &Value) -> Result<()> + 'static {
        let calls = calls.clone();
        move |new: &Value, old: &Value| {
            calls.borrow_mut().push((new.clone(), old.clone()));
            Ok(())
        }
    }

    #[test]
    fn immediate_fires_with_undefined_old_value() {
        let state = reactive(json!({ "a": 1 }));
        let calls = Calls::default();
        let handle = watch_path(
            &state,
            "a",
            recorder(&calls),
            WatchOptions {
                immediate: true,
                ..WatchOptions::default()
            },
        )
        .unwrap();

        assert_eq!(*calls.borrow(), vec![(Value::from(1), Value::Undefined)]);
        handle.unwatch();
    }

    #[test]
    fn unwatch_stops_callbacks() {
        let state = reactive(json!({ "a": 1 }));
        let calls = Calls::default();
        let handle = watch_path(&state, "a", recorder(&calls), WatchOptions::default()).unwrap();

        set(&state, "a", Value::from(2));
        Runtime::run_until_idle();
        assert_eq!(calls.borrow().len(), 1);

        handle.unwatch();
        set(&state, "a", Value::from(3));
        Runtime::run_until_idle();
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn several_writes_in_one_tick_fire_once() {
        let state = reactive(json!({ "a": 1 }));
        let calls = Calls::default();
        let read = state.clone();
        let _handle = watch(move || Ok(read.get("a")), recorder(&calls), WatchOptions::default())
            .unwrap();

        for n in 2..=5 {
            set(&state, "a", Value::from(n));
        }
        Runtime::run_until_idle();
        assert_eq!(*calls.borrow(), vec![(Value::from(5), Value::from(1))]);
    }

    #[test]
    fn watching_a_missing_key_fires_when_it_is_added() {
        let state = reactive(json!({}));
        let calls = Calls::default();
        let _handle = watch_path(&state, "late", recorder(&calls), WatchOptions::default())
            .unwrap();

        set(&state, "late", Value::from("here"));
        Runtime::run_until_idle();
        assert_eq!(*calls.borrow(), vec![(Value::from("here"), Value::Undefined)]);
    }

    #[test]
    fn callback_errors_are_reported() {
        let phases = Rc::new(RefCell::new(Vec::new()));
        let sink = phases.clone();
        Runtime::set_error_handler(move |_, ctx| sink.borrow_mut().push(ctx.phase.clone()));

        let state = reactive(json!({ "a": 1 }));
        let _handle = watch_path(
            &state,
            "a",
            |_, _| Err(ReactiveError::msg("nope")),
            WatchOptions {
                immediate: true,
                ..WatchOptions::default()
            },
        )
        .unwrap();
        set(&state, "a", Value::from(2));
        Runtime::run_until_idle();
        Runtime::clear_error_handler();

        assert_eq!(
            *phases.borrow(),
            vec![
                "callback for immediate watcher \"a\"".to_string(),
                "callback for watcher \"a\"".to_string(),
            ]
        );
    }
}
