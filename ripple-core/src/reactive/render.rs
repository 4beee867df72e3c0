//! Render watchers.
//!
//! `mount` drives a render pass the way a component does: the render
//! function produces a tree, `apply` hands it to whatever materializes it,
//! and the pair re-runs through the scheduler whenever anything the render
//! read changes. Diffing and patching are the caller's business.
//!
//! Lifecycle hooks run without dependency tracking, so reads inside them
//! never subscribe the render pass.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;
use super::value::Value;
use super::watcher::{Hook, WatchSource, Watcher, WatcherOptions};
use crate::error::Result;

/// Hooks around a render watcher's life.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    /// After the first render has been applied.
    pub mounted: Option<Hook>,
    /// Before each scheduled re-render.
    pub before_update: Option<Hook>,
    /// After the flush in which a re-render ran.
    pub updated: Option<Hook>,
}

#[derive(Default)]
struct RenderState {
    mounted: Cell<bool>,
    destroyed: Cell<bool>,
}

impl RenderState {
    fn is_live(&self) -> bool {
        self.mounted.get() && !self.destroyed.get()
    }
}

fn call_hook(hook: &Option<Hook>) {
    if let Some(hook) = hook {
        ReactiveContext::untracked(|| hook());
    }
}

/// Render once and keep re-rendering on change.
///
/// An error from the first render is returned. Errors from later renders
/// are reported by the flush that ran them.
pub fn mount<R, A>(render: R, apply: A, hooks: LifecycleHooks) -> Result<RenderWatcher>
where
    R: Fn() -> Result<Value> + 'static,
    A: Fn(Value) -> Result<()> + 'static,
{
    let state = Rc::new(RenderState::default());

    let before = {
        let state = state.clone();
        let hook = hooks.before_update.clone();
        Rc::new(move || {
            if state.is_live() {
                call_hook(&hook);
            }
        }) as Hook
    };
    let after = {
        let state = state.clone();
        let hook = hooks.updated.clone();
        Rc::new(move || {
            if state.is_live() {
                call_hook(&hook);
            }
        }) as Hook
    };

    let watcher = Watcher::new(
        WatchSource::getter(move || {
            let tree = render()?;
            apply(tree)?;
            Ok(Value::Undefined)
        }),
        None,
        WatcherOptions {
            before: Some(before),
            after: Some(after),
            label: Some("render".to_string()),
            ..WatcherOptions::default()
        },
    )?;

    state.mounted.set(true);
    debug!(subscriber = %watcher.id(), "mounted");
    call_hook(&hooks.mounted);

    Ok(RenderWatcher { watcher, state })
}

/// Handle to a mounted render pass.
pub struct RenderWatcher {
    watcher: Watcher,
    state: Rc<RenderState>,
}

impl RenderWatcher {
    pub fn id(&self) -> SubscriberId {
        self.watcher.id()
    }

    pub fn is_mounted(&self) -> bool {
        self.state.mounted.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.get()
    }

    /// Queue a re-render even though nothing changed.
    pub fn force_update(&self) {
        self.watcher.update();
    }

    /// Stop re-rendering. Idempotent.
    pub fn destroy(&self) {
        if self.state.destroyed.replace(true) {
            return;
        }
        debug!(subscriber = %self.watcher.id(), "destroyed");
        self.watcher.teardown();
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

impl fmt::Debug for RenderWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderWatcher")
            .field("id", &self.watcher.id())
            .field("mounted", &self.is_mounted())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
