//! Error types for the reactive runtime.
//!
//! Every failure that the runtime cannot hand straight back to a caller
//! (a user watcher's getter, a callback run during a flush, a runaway
//! update loop) is funneled through [`crate::reactive::report_error`]
//! together with an [`ErrorContext`] describing where it happened.

use std::fmt;

use thiserror::Error;

use crate::reactive::SubscriberId;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// Raised by evaluators, callbacks and render functions.
    #[error("{0}")]
    Evaluation(String),

    #[error(
        "failed watching path: \"{path}\" (watcher only accepts simple dot-delimited paths, use a getter instead)"
    )]
    InvalidPath { path: String },

    #[error("you may have an infinite update loop in watcher {expression} ({id}): it ran more than {limit} times in one flush")]
    RunawayUpdate {
        id: SubscriberId,
        expression: String,
        limit: usize,
    },

    #[error("cannot {operation} reactive property on {target}")]
    InvalidTarget {
        operation: &'static str,
        target: String,
    },

    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Build an evaluation error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}

/// Where a reported error came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// The subscriber that was running, if any.
    pub subscriber: Option<SubscriberId>,
    /// Phase label, e.g. `getter for watcher "a.b"` or `nextTick`.
    pub phase: String,
}

impl ErrorContext {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            subscriber: None,
            phase: phase.into(),
        }
    }

    pub fn for_subscriber(subscriber: SubscriberId, phase: impl Into<String>) -> Self {
        Self {
            subscriber: Some(subscriber),
            phase: phase.into(),
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subscriber {
            Some(id) => write!(f, "{} ({})", self.phase, id),
            None => f.write_str(&self.phase),
        }
    }
}
