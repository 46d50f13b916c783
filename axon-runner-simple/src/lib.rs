#![deny(missing_docs)]
//! Simple runner — delegates every decision to a user function.
//!
//! Implements `axon_core::Runner` for the case where the decision logic
//! fits in one closure. The closure receives the current state and the
//! signal and returns a [`Decision`]. It must be pure: the runner adds
//! no checks of its own, it only forwards.

use axon_core::{Decision, Runner, Signal};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type DecideFn = dyn Fn(Value, &Signal) -> Decision + Send + Sync;
type InitFn = dyn Fn(Value) -> Value + Send + Sync;

/// A runner backed by a plain function.
///
/// Cloning is cheap; clones share the function.
#[derive(Clone)]
pub struct SimpleRunner {
    name: String,
    decide: Arc<DecideFn>,
    init: Option<Arc<InitFn>>,
}

impl SimpleRunner {
    /// Create a runner named `name` that decides with `decide`.
    pub fn new<F>(name: impl Into<String>, decide: F) -> Self
    where
        F: Fn(Value, &Signal) -> Decision + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decide: Arc::new(decide),
            init: None,
        }
    }

    /// Seed the state at mount with `init`.
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// A runner that ignores every signal.
    pub fn noop(name: impl Into<String>) -> Self {
        Self::new(name, |state, _| Decision::state_only(state))
    }
}

impl Runner for SimpleRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, state: Value) -> Value {
        match &self.init {
            Some(init) => init(state),
            None => state,
        }
    }

    fn handle(&self, state: Value, signal: &Signal) -> Decision {
        (self.decide)(state, signal)
    }
}

impl fmt::Debug for SimpleRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleRunner")
            .field("name", &self.name)
            .field("init", &self.init.is_some())
            .finish()
    }
}
