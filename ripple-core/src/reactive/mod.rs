//! Reactive Primitives
//!
//! This module implements dependency tracking: publishers, the cells and
//! trackers that instrument plain data, and the watchers that re-run when
//! that data changes.
//!
//! # Concepts
//!
//! ## Publishers
//!
//! A [`Dep`] is a subscriber list. Every reactive property owns one, and
//! every tracked container owns one more for structural changes (keys added
//! or removed, array mutators).
//!
//! ## Tracking
//!
//! [`track`] instruments an object or array in place: each property becomes
//! a [`ReactiveCell`], each nested container is tracked in turn. Reads made
//! while a watcher is evaluating link that watcher to the cell's publisher;
//! writes notify it.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates something and records what it read. There are
//! three flavors, built on the same state machine:
//!
//! - render watchers ([`mount`]) re-run a render pass through the scheduler;
//! - computed values ([`Computed`]) are lazy and cached;
//! - user watchers ([`watch`], [`watch_path`]) call back with `(new, old)`.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded. The active watcher lives on a
//! thread-local stack (see [`ReactiveContext`]), and handles are `Rc`-based.

mod array;
mod cell;
mod computed;
mod context;
mod dep;
mod observer;
mod path;
mod render;
mod runtime;
mod subscriber;
mod traverse;
mod value;
mod watch;
mod watcher;

pub use array::Array;
pub use cell::{define_reactive, ReactiveCell};
pub use computed::{Computed, ComputedSetter};
pub use context::ReactiveContext;
pub use dep::{Dep, DepId};
pub use observer::{
    delete, is_observing, pause_observing, reactive, set, toggle_observing, track, Observer,
    ObservingPaused,
};
pub use path::{parse_path, resolve};
pub use render::{mount, LifecycleHooks, RenderWatcher};
pub use runtime::{report_error, ErrorHandler, Runtime};
pub use subscriber::{Subscriber, SubscriberId};
pub use traverse::traverse;
pub use value::{Accessor, Getter, Key, Object, Opaque, Setter, Value};
pub use watch::{watch, watch_path, Unwatch, WatchOptions};
pub use watcher::{Callback, Evaluator, Hook, WatchSource, Watcher, WatcherOptions};
