//! Transitions and their guards.

use axon_core::{Effect, Signal};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub(crate) type GuardFn = dyn Fn(&Value) -> bool + Send + Sync;
pub(crate) type EffectsFn = dyn Fn(&Value, &Signal) -> Vec<Effect> + Send + Sync;

/// One edge of the machine.
///
/// A transition fires on `event` when the current status is one of its
/// `from` states and its guard, if any, accepts the state. Its effects
/// are returned in declaration order: fixed effects first, then those
/// computed by [`effects_with`](Self::effects_with).
#[derive(Clone)]
pub struct Transition {
    pub(crate) event: String,
    pub(crate) from: Vec<String>,
    pub(crate) to: String,
    pub(crate) guard: Option<Arc<GuardFn>>,
    pub(crate) effects: Vec<Effect>,
    pub(crate) computed: Option<Arc<EffectsFn>>,
}

impl Transition {
    /// A transition on `event` into `to`. Add at least one source state
    /// with [`from`](Self::from) or [`from_states`](Self::from_states).
    pub fn new(event: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            from: Vec::new(),
            to: to.into(),
            guard: None,
            effects: Vec::new(),
            computed: None,
        }
    }

    /// Add a source state.
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.from.push(state.into());
        self
    }

    /// Add several source states.
    pub fn from_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.from.extend(states.into_iter().map(Into::into));
        self
    }

    /// Only fire when `guard` returns true for the current state.
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Append a fixed effect.
    pub fn effect(mut self, effect: impl Into<Effect>) -> Self {
        self.effects.push(effect.into());
        self
    }

    /// Derive further effects from the state and the triggering signal.
    /// `effects` must be pure like the rest of a runner.
    pub fn effects_with<F>(mut self, effects: F) -> Self
    where
        F: Fn(&Value, &Signal) -> Vec<Effect> + Send + Sync + 'static,
    {
        self.computed = Some(Arc::new(effects));
        self
    }

    /// The triggering event.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Source states.
    pub fn sources(&self) -> &[String] {
        &self.from
    }

    /// Target state.
    pub fn target(&self) -> &str {
        &self.to
    }

    pub(crate) fn accepts(&self, current: &str, event: &str, state: &Value) -> bool {
        self.event == event
            && self.from.iter().any(|s| s == current)
            && self.guard.as_ref().is_none_or(|guard| guard(state))
    }

    pub(crate) fn effects_for(&self, state: &Value, signal: &Signal) -> Vec<Effect> {
        let mut effects = self.effects.clone();
        if let Some(computed) = &self.computed {
            effects.extend(computed(state, signal));
        }
        effects
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("event", &self.event)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("guarded", &self.guard.is_some())
            .field("effects", &self.effects)
            .finish()
    }
}
