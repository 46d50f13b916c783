//! The Runner contract — pure decision engines.

use crate::effect::Effect;
use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of one decision step: the next state and what should
/// happen next.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The state after the step, before state modifications are folded.
    pub state: Value,
    /// Effects in execution order.
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Decision {
    /// A decision that carries `state` as given and asks for no effects.
    /// The state may differ from the one the runner received.
    pub fn state_only(state: Value) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    /// A decision with effects.
    pub fn new(state: Value, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    /// Append an effect.
    pub fn with_effect(mut self, effect: impl Into<Effect>) -> Self {
        self.effects.push(effect.into());
        self
    }
}

/// A decision engine.
///
/// `handle` must be referentially pure: no I/O, no shared mutation, and
/// identical inputs always produce identical outputs. It must also be
/// total — a signal the engine does not recognize yields the state
/// unchanged and no effects, never a panic.
///
/// Engine progress that has to survive between signals goes into the
/// state itself (under [`crate::state::RUNNER_FIELD`]), never into the
/// runner. Runners are shared immutable configuration.
///
/// Implementations:
/// - `SimpleRunner`: delegates to a user function
/// - `StateMachine`: guarded finite-state machine
/// - tool-loop and planning engines (outside this workspace) implement
///   the same trait
pub trait Runner: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Seed the state once at mount. Defaults to identity.
    fn init(&self, state: Value) -> Value {
        state
    }

    /// Decide what to do with `signal`.
    fn handle(&self, state: Value, signal: &Signal) -> Decision;
}
