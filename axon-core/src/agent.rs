//! Agent snapshots.

use crate::effect::{Effect, Instruction};
use crate::error::{ReplayError, StateError, ValidationError};
use crate::id::{ActionName, AgentId};
use crate::pattern::SignalPattern;
use crate::replay::TurnRecord;
use crate::runner::{Decision, Runner};
use crate::signal::Signal;
use crate::state;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Why a server stopped.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Asked to stop.
    Normal,
    /// Every handle to the server was dropped.
    Shutdown,
    /// Stopped because of a failure.
    Error(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Normal => f.write_str("normal"),
            StopReason::Shutdown => f.write_str("shutdown"),
            StopReason::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Optional lifecycle callbacks of an agent.
///
/// Both run on the worker. `mount` is pure like a runner step; its
/// effects run before the first signal is taken. `terminate` is for
/// cleanup only — it cannot produce effects.
pub trait AgentHooks: Send + Sync {
    /// Runs once before the server accepts signals.
    fn mount(&self, state: Value) -> Decision {
        Decision::state_only(state)
    }

    /// Runs once on shutdown.
    fn terminate(&self, _reason: &StopReason, _state: &Value) {}
}

struct NoHooks;

impl AgentHooks for NoHooks {}

/// One declared state field.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Value filled in at mount when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Mounting fails when the field is absent and has no default.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    /// An optional field with a default.
    pub fn with_default(default: Value) -> Self {
        Self {
            default: Some(default),
            required: false,
        }
    }

    /// A required field without a default.
    pub fn required() -> Self {
        Self {
            default: None,
            required: true,
        }
    }
}

/// Declared top-level state fields.
///
/// This is field wiring, not payload validation: defaults are filled in
/// and required fields checked for presence at mount, nothing more.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Declared fields.
    pub fn fields(&self) -> &BTreeMap<String, FieldSpec> {
        &self.fields
    }

    /// Fill defaults into `state` and check required fields.
    pub fn apply(&self, state: &mut Value) -> Result<(), ValidationError> {
        let found = state::type_name(state);
        let map = state
            .as_object_mut()
            .ok_or_else(|| ValidationError::StateNotObject(found.to_owned()))?;
        for (name, spec) in &self.fields {
            if map.contains_key(name) {
                continue;
            }
            match &spec.default {
                Some(default) => {
                    map.insert(name.clone(), default.clone());
                }
                None if spec.required => return Err(ValidationError::MissingField(name.clone())),
                None => {}
            }
        }
        Ok(())
    }
}

/// An immutable agent snapshot.
///
/// Nothing here mutates in place. Every method that changes the agent
/// returns a new snapshot; the server swaps it in once a turn commits.
/// Cloning is cheap apart from the state value itself.
#[derive(Clone)]
pub struct Agent {
    id: AgentId,
    state: Value,
    schema: Arc<Schema>,
    actions: BTreeSet<ActionName>,
    routes: Vec<(SignalPattern, ActionName)>,
    runner: Arc<dyn Runner>,
    hooks: Arc<dyn AgentHooks>,
}

impl Agent {
    /// Start building an agent.
    pub fn builder(id: impl Into<AgentId>, runner: Arc<dyn Runner>) -> AgentBuilder {
        AgentBuilder {
            id: id.into(),
            state: Value::Object(Map::new()),
            schema: Schema::new(),
            actions: BTreeSet::new(),
            routes: Vec::new(),
            runner,
            hooks: Arc::new(NoHooks),
        }
    }

    /// The agent id.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// The current state.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// The declared schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Actions the agent may run.
    pub fn actions(&self) -> &BTreeSet<ActionName> {
        &self.actions
    }

    /// Whether the agent may run `action`.
    pub fn can_run(&self, action: &ActionName) -> bool {
        self.actions.contains(action)
    }

    /// The route table, in insertion order.
    pub fn routes(&self) -> &[(SignalPattern, ActionName)] {
        &self.routes
    }

    /// Name of the wired runner.
    pub fn runner_name(&self) -> &str {
        self.runner.name()
    }

    /// Candidate action for an inbound signal type: an exact route wins,
    /// otherwise the first matching pattern in insertion order.
    pub fn route(&self, signal_type: &str) -> Option<&ActionName> {
        resolve_route(&self.routes, signal_type)
    }

    /// Prepare a freshly built agent: fill schema defaults, let the
    /// runner seed its scratch data, then run the `mount` hook and fold
    /// its state modifications. The returned effects are for the server
    /// to execute before taking the first signal.
    pub fn mount(self) -> Result<(Agent, Vec<Effect>), StateError> {
        let mut initial = self.state.clone();
        state::ensure_object(&initial)?;
        self.schema.apply(&mut initial)?;
        let seeded = self.runner.init(initial);
        let decision = self.hooks.mount(seeded);
        let mounted = state::fold(decision.state, &decision.effects)?;
        state::ensure_object(&mounted)?;
        Ok((self.with_state_unchecked(mounted), decision.effects))
    }

    /// Run one decision step. State modifications among the returned
    /// effects are already folded into the new snapshot; they stay in
    /// the list so the turn can be journaled and replayed.
    pub fn handle_signal(&self, signal: &Signal) -> Result<(Agent, Vec<Effect>), StateError> {
        let decision = self.decide(&self.routes, &self.state, signal);
        let next = state::fold(decision.state, &decision.effects)?;
        state::ensure_object(&next)?;
        Ok((self.with_state_unchecked(next), decision.effects))
    }

    /// Run the `terminate` hook.
    pub fn terminate(&self, reason: &StopReason) {
        self.hooks.terminate(reason, &self.state);
    }

    /// Re-run a recorded turn through this agent's runner and return the
    /// reproduced final state. Routed signals resolve against the route
    /// table stored in the record. Fails if the runner no longer produces
    /// the recorded effects.
    pub fn replay(&self, record: &TurnRecord) -> Result<Value, ReplayError> {
        let decision = self.decide(&record.routes, &record.state_before, &record.signal);
        if let Some(index) = first_difference(&decision.effects, &record.effects) {
            return Err(ReplayError::EffectsDiverged { index });
        }
        Ok(state::fold(decision.state, &record.effects)?)
    }

    /// [`replay`](Self::replay) and require the result to equal the
    /// recorded `state_after`.
    pub fn verify_replay(&self, record: &TurnRecord) -> Result<(), ReplayError> {
        if self.replay(record)? == record.state_after {
            Ok(())
        } else {
            Err(ReplayError::StateDiverged)
        }
    }

    /// A snapshot with a different state.
    pub fn with_state(&self, state: Value) -> Result<Agent, ValidationError> {
        if !state.is_object() {
            return Err(ValidationError::StateNotObject(
                state::type_name(&state).to_owned(),
            ));
        }
        Ok(self.with_state_unchecked(state))
    }

    /// A snapshot that may also run `action`.
    pub fn with_action(&self, action: ActionName) -> Agent {
        let mut next = self.clone();
        next.actions.insert(action);
        next
    }

    /// A snapshot that may no longer run `action`.
    pub fn without_action(&self, action: &ActionName) -> Agent {
        let mut next = self.clone();
        next.actions.remove(action);
        next
    }

    /// A snapshot with a route added. Re-adding a pattern retargets it in place.
    pub fn with_route(&self, pattern: SignalPattern, target: ActionName) -> Agent {
        let mut next = self.clone();
        match next.routes.iter_mut().find(|(p, _)| *p == pattern) {
            Some(route) => route.1 = target,
            None => next.routes.push((pattern, target)),
        }
        next
    }

    /// A snapshot without the route registered under `pattern`.
    pub fn without_route(&self, pattern: &SignalPattern) -> Agent {
        let mut next = self.clone();
        next.routes.retain(|(p, _)| p != pattern);
        next
    }

    /// Ask the runner. A signal the runner ignores (no effects, state
    /// untouched) falls through to the route table: a matching route
    /// turns it into a `Run` of the routed action with the signal data
    /// as params.
    fn decide(
        &self,
        routes: &[(SignalPattern, ActionName)],
        state: &Value,
        signal: &Signal,
    ) -> Decision {
        let decision = self.runner.handle(state.clone(), signal);
        if !decision.effects.is_empty() || decision.state != *state {
            return decision;
        }
        match resolve_route(routes, &signal.signal_type) {
            Some(action) => {
                let instruction = Instruction::new(action.clone(), signal.data.clone())
                    .with_context(serde_json::json!({ "routed": signal.signal_type }));
                Decision::state_only(decision.state).with_effect(instruction)
            }
            None => decision,
        }
    }

    fn with_state_unchecked(&self, state: Value) -> Agent {
        Agent {
            state,
            ..self.clone()
        }
    }
}

fn resolve_route<'a>(
    routes: &'a [(SignalPattern, ActionName)],
    signal_type: &str,
) -> Option<&'a ActionName> {
    routes
        .iter()
        .find(|(pattern, _)| pattern.is_exact() && pattern.as_str() == signal_type)
        .or_else(|| routes.iter().find(|(pattern, _)| pattern.matches(signal_type)))
        .map(|(_, action)| action)
}

fn first_difference(produced: &[Effect], recorded: &[Effect]) -> Option<usize> {
    produced
        .iter()
        .zip(recorded)
        .position(|(a, b)| a != b)
        .or_else(|| (produced.len() != recorded.len()).then(|| produced.len().min(recorded.len())))
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("actions", &self.actions)
            .field("routes", &self.routes)
            .field("runner", &self.runner.name())
            .finish()
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    id: AgentId,
    state: Value,
    schema: Schema,
    actions: BTreeSet<ActionName>,
    routes: Vec<(SignalPattern, ActionName)>,
    runner: Arc<dyn Runner>,
    hooks: Arc<dyn AgentHooks>,
}

impl AgentBuilder {
    /// Initial state. Must be a JSON object by the time the agent mounts.
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Declared fields.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Allow an action.
    pub fn action(mut self, action: impl Into<ActionName>) -> Self {
        self.actions.insert(action.into());
        self
    }

    /// Add a route.
    pub fn route(mut self, pattern: impl Into<SignalPattern>, target: impl Into<ActionName>) -> Self {
        self.routes.push((pattern.into(), target.into()));
        self
    }

    /// Lifecycle callbacks.
    pub fn hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Finish building. The agent still has to be mounted.
    pub fn build(self) -> Agent {
        Agent {
            id: self.id,
            state: self.state,
            schema: Arc::new(self.schema),
            actions: self.actions,
            routes: self.routes,
            runner: self.runner,
            hooks: self.hooks,
        }
    }
}
