//! Effect system — what a decision step wants to happen, as data.

use crate::dispatch::Destination;
use crate::id::{ActionName, ChildTag, CorrelationId, TimerKey};
use crate::pattern::SignalPattern;
use crate::signal::Signal;
use crate::state::StatePath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative instruction returned by a decision step. NOT executed
/// by the step — the hosting server interprets it after committing the
/// new state.
///
/// Every variant carries what it needs to be logged and replayed on its
/// own. Live resources are never referenced directly: children are named
/// by [`ChildTag`], timers by [`TimerKey`], actions by [`ActionName`].
///
/// The set is closed. Interpreters match it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Invoke an action asynchronously. Its outcome comes back as an
    /// `action_result`, `action_error` or `timeout_fired` signal.
    Run(Instruction),

    /// Pure change to the agent's own state, folded inside the turn.
    StateModification {
        /// Which modification.
        op: ModifyOp,
        /// Where in the state. Ignored by `replace`.
        #[serde(default)]
        path: StatePath,
        /// The value to set, merge or substitute. Ignored by `delete`.
        #[serde(default)]
        value: Value,
    },

    /// Publish a new signal through the dispatch adapter.
    Emit {
        /// Type of the emitted signal.
        signal_type: String,
        /// Payload of the emitted signal.
        data: Value,
        /// Source to stamp on the signal; defaults to the agent id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        /// Where to deliver; defaults to the server's configured destination.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<Destination>,
    },

    /// Answer a pending synchronous call.
    Reply {
        /// Correlation id of the call being answered.
        to: CorrelationId,
        /// The reply itself.
        signal: Signal,
    },

    /// Re-deliver `signal` to this agent after `delay_ms`.
    Timer {
        /// Delay before delivery, in milliseconds.
        delay_ms: u64,
        /// The signal to deliver.
        signal: Signal,
        /// Re-arming an already pending key cancels the earlier timer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dedup_key: Option<TimerKey>,
    },

    /// Start a tracked child unit of work.
    Spawn {
        /// What to start and under which tag.
        spec: ChildSpec,
        /// Start arguments.
        #[serde(default)]
        args: Value,
    },

    /// Stop a tracked child.
    Kill {
        /// Tag the child was spawned under.
        child: ChildTag,
    },

    /// Allow the agent to run an action.
    RegisterAction {
        /// The action to allow.
        action: ActionName,
    },

    /// Stop allowing the agent to run an action.
    DeregisterAction {
        /// The action to disallow.
        action: ActionName,
    },

    /// Map inbound signal types matching `path` to an action.
    AddRoute {
        /// Signal type pattern.
        path: SignalPattern,
        /// Candidate action.
        target: ActionName,
    },

    /// Remove a route.
    RemoveRoute {
        /// The pattern the route was added under.
        path: SignalPattern,
    },
}

impl Effect {
    /// `Run` an action with `params` and default options.
    pub fn run(action: impl Into<ActionName>, params: Value) -> Self {
        Effect::Run(Instruction::new(action, params))
    }

    /// Set the value at `path`.
    pub fn set(path: impl Into<StatePath>, value: Value) -> Self {
        Effect::StateModification {
            op: ModifyOp::Set,
            path: path.into(),
            value,
        }
    }

    /// Deep-merge `value` into the value at `path`.
    pub fn update(path: impl Into<StatePath>, value: Value) -> Self {
        Effect::StateModification {
            op: ModifyOp::Update,
            path: path.into(),
            value,
        }
    }

    /// Remove the value at `path`.
    pub fn delete(path: impl Into<StatePath>) -> Self {
        Effect::StateModification {
            op: ModifyOp::Delete,
            path: path.into(),
            value: Value::Null,
        }
    }

    /// Substitute the whole state.
    pub fn replace(state: Value) -> Self {
        Effect::StateModification {
            op: ModifyOp::Replace,
            path: StatePath::root(),
            value: state,
        }
    }

    /// Emit a signal to the default destination.
    pub fn emit(signal_type: impl Into<String>, data: Value) -> Self {
        Effect::Emit {
            signal_type: signal_type.into(),
            data,
            source: None,
            destination: None,
        }
    }

    /// Reply to the call that `request` belongs to. Requests without a
    /// correlation id get an empty one, which no caller waits on.
    pub fn reply(request: &Signal, signal_type: impl Into<String>, data: Value) -> Self {
        Effect::Reply {
            to: request.correlation_id.clone().unwrap_or_else(|| CorrelationId::new("")),
            signal: request.reply(signal_type, data),
        }
    }

    /// Re-deliver `signal` after `delay_ms`, without deduplication.
    pub fn timer(delay_ms: u64, signal: Signal) -> Self {
        Effect::Timer {
            delay_ms,
            signal,
            dedup_key: None,
        }
    }

    /// Re-deliver `signal` after `delay_ms`, replacing any pending timer
    /// armed under `key`.
    pub fn timer_keyed(delay_ms: u64, signal: Signal, key: impl Into<TimerKey>) -> Self {
        Effect::Timer {
            delay_ms,
            signal,
            dedup_key: Some(key.into()),
        }
    }

    /// Short name of the variant, for logs and hook reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Run(_) => "run",
            Effect::StateModification { .. } => "state_modification",
            Effect::Emit { .. } => "emit",
            Effect::Reply { .. } => "reply",
            Effect::Timer { .. } => "timer",
            Effect::Spawn { .. } => "spawn",
            Effect::Kill { .. } => "kill",
            Effect::RegisterAction { .. } => "register_action",
            Effect::DeregisterAction { .. } => "deregister_action",
            Effect::AddRoute { .. } => "add_route",
            Effect::RemoveRoute { .. } => "remove_route",
        }
    }

    /// Whether the effect only changes the agent snapshot (no I/O).
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Effect::StateModification { .. }
                | Effect::RegisterAction { .. }
                | Effect::DeregisterAction { .. }
                | Effect::AddRoute { .. }
                | Effect::RemoveRoute { .. }
        )
    }
}

/// The kinds of state modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyOp {
    /// Replace the value at the path.
    Set,
    /// Deep-merge into the value at the path.
    Update,
    /// Remove the path.
    Delete,
    /// Substitute the entire state.
    Replace,
}

/// The concrete invocation wrapped by [`Effect::Run`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Action to invoke.
    pub action: ActionName,
    /// Parameters passed to the action.
    #[serde(default)]
    pub params: Value,
    /// Opaque context passed through to the action.
    #[serde(default)]
    pub context: Value,
    /// Timeout and retry policy.
    #[serde(default)]
    pub opts: RunOpts,
}

impl Instruction {
    /// Create an instruction with empty context and default options.
    pub fn new(action: impl Into<ActionName>, params: Value) -> Self {
        Self {
            action: action.into(),
            params,
            context: Value::Null,
            opts: RunOpts::default(),
        }
    }

    /// Attach opaque context.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Replace the run options.
    pub fn with_opts(mut self, opts: RunOpts) -> Self {
        self.opts = opts;
        self
    }
}

impl From<Instruction> for Effect {
    fn from(instruction: Instruction) -> Self {
        Effect::Run(instruction)
    }
}

/// Per-instruction execution policy. Every field has a neutral default.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOpts {
    /// Abort the action after this many milliseconds. `None` waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// How many times a retryable failure is retried.
    #[serde(default)]
    pub retries: u32,
    /// Delay before retry `n` is `n * backoff_ms`.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl RunOpts {
    /// Set the timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the retry count and linear backoff.
    pub fn with_retries(mut self, retries: u32, backoff_ms: u64) -> Self {
        self.retries = retries;
        self.backoff_ms = backoff_ms;
        self
    }
}

/// What to start for [`Effect::Spawn`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSpec {
    /// Tag the child is tracked under.
    pub tag: ChildTag,
    /// Supervisor-specific kind of child.
    pub kind: String,
    /// Supervisor-specific configuration.
    #[serde(default)]
    pub config: Value,
}

impl ChildSpec {
    /// Create a child spec with empty configuration.
    pub fn new(tag: impl Into<ChildTag>, kind: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: kind.into(),
            config: Value::Null,
        }
    }

    /// Attach configuration.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}
