//! Ripple Core
//!
//! A reactive dependency-tracking engine and update scheduler for UI
//! runtimes. It implements:
//!
//! - Dynamic values whose objects and arrays can be instrumented in place
//! - Automatic dependency tracking between reactive fields and watchers
//! - Lazy, cached computed values
//! - A deduplicating, id-ordered update queue flushed once per tick
//! - Pluggable tick hosts: a deterministic event loop or a `tokio` `LocalSet`
//!
//! # Architecture
//!
//! - `reactive`: values, publishers, trackers and watchers
//! - `scheduler`: the subscriber queue, the tick batch and task hosts
//! - `error`: the error type and reporting context
//! - `config`: per-thread runtime configuration
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{reactive, set, watch_path, Runtime, Value, WatchOptions};
//! use serde_json::json;
//!
//! let state = reactive(json!({ "count": 1 }));
//!
//! let handle = watch_path(&state, "count", |new, old| {
//!     println!("count: {old:?} -> {new:?}");
//!     Ok(())
//! }, WatchOptions::default()).unwrap();
//!
//! set(&state, "count", Value::from(2));
//! // The callback runs once the tick flushes.
//! Runtime::run_until_idle();
//! handle.unwatch();
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use error::{ErrorContext, ReactiveError, Result};
pub use reactive::{
    delete, mount, reactive, set, track, watch, watch_path, Array, Computed, Key,
    LifecycleHooks, Object, RenderWatcher, Runtime, Unwatch, Value, WatchOptions, Watcher,
};
pub use scheduler::{next_tick, tick, with_macro_task, EventLoop, TaskHost, TickPriority, TokioHost};
