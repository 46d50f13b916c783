#![deny(missing_docs)]
//! Finite-state-machine runner for axon.
//!
//! [`StateMachine`] implements `axon_core::Runner` as a guarded FSM.
//! The machine itself is immutable configuration; the current status
//! lives in the agent state under a configurable path (by default
//! `__runner.status`), so the agent snapshot stays the single source of
//! truth and every decision is a pure function of `(state, signal)`.
//!
//! ## Step
//!
//! 1. The event is the signal type, or whatever the configured event
//!    function derives from the signal.
//! 2. The current status is read from the state; a missing or
//!    non-string status counts as the initial state.
//! 3. Transitions are scanned in declaration order. The first whose
//!    `from` contains the current status, whose event matches and whose
//!    guard is absent or true wins.
//! 4. The winner's target is written to the state and its effects are
//!    returned. With no winner the state is returned untouched with no
//!    effects.

mod error;
mod transition;

pub use error::FsmError;
pub use transition::Transition;

use axon_core::state::{self, StatePath};
use axon_core::{Decision, Runner, Signal};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

type EventFn = dyn Fn(&Signal) -> String + Send + Sync;

/// Name reported by machines built without [`StateMachineBuilder::name`].
pub const DEFAULT_NAME: &str = "state_machine";

/// A guarded finite-state machine.
#[derive(Clone)]
pub struct StateMachine {
    name: String,
    states: Vec<String>,
    initial: String,
    transitions: Vec<Transition>,
    state_key: StatePath,
    event: Option<Arc<EventFn>>,
}

impl StateMachine {
    /// Start configuring a machine.
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    /// Declared states, in declaration order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The initial state.
    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Transitions, in declaration order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Where the status is kept.
    pub fn state_key(&self) -> &StatePath {
        &self.state_key
    }

    /// The current status recorded in `state`.
    pub fn status<'a>(&'a self, state: &'a Value) -> &'a str {
        self.state_key
            .get(state)
            .and_then(Value::as_str)
            .unwrap_or(&self.initial)
    }

    fn event_of(&self, signal: &Signal) -> String {
        match &self.event {
            Some(event) => event(signal),
            None => signal.signal_type.clone(),
        }
    }

    fn select(&self, state: &Value, event: &str) -> Option<&Transition> {
        let current = self.status(state);
        self.transitions
            .iter()
            .find(|t| t.accepts(current, event, state))
    }

    fn write_status(&self, state: &mut Value, status: &str) -> bool {
        if self.state_key.segments().first().map(String::as_str) == Some(state::RUNNER_FIELD)
            && state::ensure_scratch(state).is_err()
        {
            return false;
        }
        self.state_key.set(state, Value::from(status)).is_ok()
    }
}

impl Runner for StateMachine {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, mut state: Value) -> Value {
        if self.state_key.get(&state).is_none() {
            let mut seeded = state.clone();
            if self.write_status(&mut seeded, &self.initial) {
                state = seeded;
            }
        }
        state
    }

    fn handle(&self, state: Value, signal: &Signal) -> Decision {
        let event = self.event_of(signal);
        let Some(transition) = self.select(&state, &event) else {
            return Decision::state_only(state);
        };
        let effects = transition.effects_for(&state, signal);
        let mut next = state.clone();
        if !self.write_status(&mut next, &transition.to) {
            // The status path runs through a non-object value.
            return Decision::state_only(state);
        }
        Decision::new(next, effects)
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("initial", &self.initial)
            .field("transitions", &self.transitions)
            .field("state_key", &self.state_key.to_string())
            .finish()
    }
}

/// Builder for [`StateMachine`]. Validation happens in [`build`](Self::build).
pub struct StateMachineBuilder {
    name: String,
    states: Vec<String>,
    initial: Option<String>,
    transitions: Vec<Transition>,
    state_key: StatePath,
    event: Option<Arc<EventFn>>,
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            states: Vec::new(),
            initial: None,
            transitions: Vec::new(),
            state_key: StatePath::scratch("status"),
            event: None,
        }
    }
}

impl StateMachineBuilder {
    /// Name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare one state.
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.states.push(state.into());
        self
    }

    /// Declare several states.
    pub fn states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states.extend(states.into_iter().map(Into::into));
        self
    }

    /// The initial state.
    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    /// Append a transition. Declaration order is priority order.
    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Keep the status at `path` instead of `__runner.status`.
    pub fn state_key(mut self, path: impl Into<StatePath>) -> Self {
        self.state_key = path.into();
        self
    }

    /// Derive the event from the signal instead of using its type.
    pub fn event_fn<F>(mut self, event: F) -> Self
    where
        F: Fn(&Signal) -> String + Send + Sync + 'static,
    {
        self.event = Some(Arc::new(event));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<StateMachine, FsmError> {
        if self.states.is_empty() {
            return Err(FsmError::NoStates);
        }
        let mut declared = BTreeSet::new();
        for state in &self.states {
            if !declared.insert(state.as_str()) {
                return Err(FsmError::DuplicateState(state.clone()));
            }
        }
        let initial = self.initial.ok_or(FsmError::NoInitialState)?;
        if !declared.contains(initial.as_str()) {
            return Err(FsmError::UnknownInitialState(initial));
        }
        if self.state_key.is_root() {
            return Err(FsmError::EmptyStateKey);
        }
        for (index, transition) in self.transitions.iter().enumerate() {
            if transition.from.is_empty() {
                return Err(FsmError::NoSourceStates {
                    index,
                    event: transition.event.clone(),
                });
            }
            let unknown = transition
                .from
                .iter()
                .chain(std::iter::once(&transition.to))
                .find(|s| !declared.contains(s.as_str()));
            if let Some(state) = unknown {
                return Err(FsmError::UnknownState {
                    index,
                    event: transition.event.clone(),
                    state: state.clone(),
                });
            }
        }
        Ok(StateMachine {
            name: self.name,
            states: self.states,
            initial,
            transitions: self.transitions,
            state_key: self.state_key,
            event: self.event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn toggle() -> StateMachine {
        StateMachine::builder()
            .states(["off", "on"])
            .initial("off")
            .transition(Transition::new("flip", "on").from("off"))
            .transition(Transition::new("flip", "off").from("on"))
            .build()
            .unwrap()
    }

    #[test]
    fn init_seeds_the_initial_status() {
        let state = toggle().init(json!({}));
        assert_eq!(state["__runner"]["status"], json!("off"));
        assert_eq!(state["__runner"]["version"], json!(1));
    }

    #[test]
    fn init_keeps_an_existing_status() {
        let state = toggle().init(json!({"__runner": {"version": 1, "status": "on"}}));
        assert_eq!(state["__runner"]["status"], json!("on"));
    }

    #[test]
    fn missing_status_counts_as_initial() {
        let decision = toggle().handle(json!({}), &Signal::new("flip", json!({})));
        assert_eq!(decision.state["__runner"]["status"], json!("on"));
    }

    #[test]
    fn flips_back_and_forth() {
        let machine = toggle();
        let flip = Signal::new("flip", json!({}));
        let once = machine.handle(machine.init(json!({})), &flip).state;
        let twice = machine.handle(once, &flip).state;
        assert_eq!(machine.status(&twice), "off");
    }

    #[test]
    fn custom_state_key() {
        let machine = StateMachine::builder()
            .states(["a", "b"])
            .initial("a")
            .state_key("phase")
            .transition(Transition::new("go", "b").from("a"))
            .build()
            .unwrap();
        assert_eq!(machine.init(json!({})), json!({"phase": "a"}));
        let decision = machine.handle(json!({"phase": "a"}), &Signal::new("go", json!({})));
        assert_eq!(decision.state, json!({"phase": "b"}));
    }

    #[test]
    fn status_path_through_a_scalar_is_a_noop() {
        let machine = StateMachine::builder()
            .states(["a", "b"])
            .initial("a")
            .state_key("phase.current")
            .transition(Transition::new("go", "b").from("a"))
            .build()
            .unwrap();
        let decision = machine.handle(json!({"phase": 3}), &Signal::new("go", json!({})));
        assert_eq!(decision.state, json!({"phase": 3}));
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn event_fn_overrides_signal_type() {
        let machine = StateMachine::builder()
            .states(["off", "on"])
            .initial("off")
            .event_fn(|signal| signal.data["event"].as_str().unwrap_or_default().to_owned())
            .transition(Transition::new("flip", "on").from("off"))
            .build()
            .unwrap();
        let decision = machine.handle(
            json!({}),
            &Signal::new("command", json!({"event": "flip"})),
        );
        assert_eq!(machine.status(&decision.state), "on");
    }

    #[test]
    fn validation_errors() {
        assert_eq!(
            StateMachine::builder().initial("a").build().unwrap_err(),
            FsmError::NoStates
        );
        assert_eq!(
            StateMachine::builder().state("a").build().unwrap_err(),
            FsmError::NoInitialState
        );
        assert_eq!(
            StateMachine::builder()
                .states(["a", "a"])
                .initial("a")
                .build()
                .unwrap_err(),
            FsmError::DuplicateState("a".into())
        );
        assert_eq!(
            StateMachine::builder()
                .state("a")
                .initial("b")
                .build()
                .unwrap_err(),
            FsmError::UnknownInitialState("b".into())
        );
        assert_eq!(
            StateMachine::builder()
                .state("a")
                .initial("a")
                .state_key("")
                .build()
                .unwrap_err(),
            FsmError::EmptyStateKey
        );
        assert_eq!(
            StateMachine::builder()
                .state("a")
                .initial("a")
                .transition(Transition::new("go", "a"))
                .build()
                .unwrap_err(),
            FsmError::NoSourceStates {
                index: 0,
                event: "go".into()
            }
        );
        let err = StateMachine::builder()
            .state("a")
            .initial("a")
            .transition(Transition::new("go", "a").from("a"))
            .transition(Transition::new("go", "z").from("a"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            FsmError::UnknownState {
                index: 1,
                event: "go".into(),
                state: "z".into()
            }
        );
        assert_eq!(err.kind(), axon_core::ErrorKind::Validation);
    }
}
