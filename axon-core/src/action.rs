//! Actions — external units of work invoked by `Effect::Run`.

use crate::effect::{ChildSpec, Effect, ModifyOp};
use crate::error::ActionError;
use crate::id::{ActionName, AgentId, ChildTag, CorrelationId, SignalId};
use crate::signal::Signal;
use crate::state::StatePath;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What an action gets to know about the turn that started it.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    /// The agent that issued the `Run` effect.
    pub agent: AgentId,
    /// The signal whose turn produced the `Run` effect.
    pub signal: SignalId,
    /// Correlation id of that signal, if any.
    pub correlation_id: Option<CorrelationId>,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// The instruction's opaque context.
    pub context: Value,
}

impl ActionContext {
    /// Create a first-attempt context.
    pub fn new(agent: AgentId, cause: &Signal, context: Value) -> Self {
        Self {
            agent,
            signal: cause.id.clone(),
            correlation_id: cause.correlation_id.clone(),
            attempt: 1,
            context,
        }
    }
}

/// A follow-up request an action returns alongside its result.
///
/// Directives re-enter the decision loop as data inside the
/// `action_result` signal. A runner that wants to honor them converts
/// them with [`Directive::into_effect`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    /// Deliver a signal back to the agent.
    Enqueue {
        /// The signal to deliver.
        signal: Signal,
    },
    /// Allow an action.
    RegisterAction {
        /// The action to allow.
        action: ActionName,
    },
    /// Disallow an action.
    DeregisterAction {
        /// The action to disallow.
        action: ActionName,
    },
    /// Start a child.
    Spawn {
        /// What to start.
        spec: ChildSpec,
        /// Start arguments.
        #[serde(default)]
        args: Value,
    },
    /// Stop a child.
    Kill {
        /// The child's tag.
        child: ChildTag,
    },
    /// Modify the agent's state.
    StateModification {
        /// Which modification.
        op: ModifyOp,
        /// Where.
        #[serde(default)]
        path: StatePath,
        /// With what.
        #[serde(default)]
        value: Value,
    },
}

impl Directive {
    /// The effect that carries out this directive. `Enqueue` becomes a
    /// zero-delay timer.
    pub fn into_effect(self) -> Effect {
        match self {
            Directive::Enqueue { signal } => Effect::timer(0, signal),
            Directive::RegisterAction { action } => Effect::RegisterAction { action },
            Directive::DeregisterAction { action } => Effect::DeregisterAction { action },
            Directive::Spawn { spec, args } => Effect::Spawn { spec, args },
            Directive::Kill { child } => Effect::Kill { child },
            Directive::StateModification { op, path, value } => {
                Effect::StateModification { op, path, value }
            }
        }
    }

    /// Decode the `directives` array of an `action_result` signal.
    /// Entries that do not decode are skipped.
    pub fn from_result(signal: &Signal) -> Vec<Directive> {
        signal
            .data
            .get("directives")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Successful action outcome.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionOutput {
    /// The result value.
    pub result: Value,
    /// Follow-up requests.
    #[serde(default)]
    pub directives: Vec<Directive>,
}

impl ActionOutput {
    /// A result without directives.
    pub fn new(result: Value) -> Self {
        Self {
            result,
            directives: Vec::new(),
        }
    }

    /// Attach a directive.
    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }
}

/// An external unit of work.
///
/// Actions may perform arbitrary I/O and may be slow. The server never
/// awaits them on the turn path; each invocation runs on its own task.
#[async_trait]
pub trait Action: Send + Sync {
    /// Name the action is registered under.
    fn name(&self) -> &str;

    /// Run the action once.
    async fn invoke(&self, params: Value, ctx: ActionContext) -> Result<ActionOutput, ActionError>;
}

/// Explicit name → action table, built at startup and handed to servers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<ActionName, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under its own name, replacing any previous one.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions
            .insert(ActionName::new(action.name()), action);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, action: Arc<dyn Action>) -> Self {
        self.register(action);
        self
    }

    /// Look up an action.
    pub fn get(&self, name: &ActionName) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Whether an action is registered under `name`.
    pub fn contains(&self, name: &ActionName) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &ActionName> {
        self.actions.keys()
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}
