//! The Hook interface — observation of a server's turn loop.

use crate::effect::Effect;
use crate::error::{ErrorKind, HookError};
use crate::id::{AgentId, SignalId};
use crate::signal::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where in the turn loop a hook fires.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// A signal was dequeued and is about to be decided on.
    TurnStarted,
    /// All effects of a turn ran (or the turn halted).
    TurnCompleted,
    /// Applying an effect failed; the rest of the turn was skipped.
    EffectFailed,
    /// The runner panicked; the server moved to the error status.
    RunnerPanicked,
    /// A signal could not be enqueued (overflow or shutdown).
    SignalDropped,
    /// The execution mode changed.
    ModeChanged,
    /// Full per-turn trace. Only fires in debug mode.
    Trace,
}

impl HookPoint {
    /// Every hook point.
    pub const ALL: [HookPoint; 7] = [
        HookPoint::TurnStarted,
        HookPoint::TurnCompleted,
        HookPoint::EffectFailed,
        HookPoint::RunnerPanicked,
        HookPoint::SignalDropped,
        HookPoint::ModeChanged,
        HookPoint::Trace,
    ];
}

/// State before and after one turn, with the effects it produced.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnTrace {
    /// State when the signal was dequeued.
    pub state_before: Value,
    /// State committed by the turn.
    pub state_after: Value,
    /// Effects in returned order.
    pub effects: Vec<Effect>,
}

impl TurnTrace {
    /// Create a trace.
    pub fn new(state_before: Value, state_after: Value, effects: Vec<Effect>) -> Self {
        Self {
            state_before,
            state_after,
            effects,
        }
    }
}

/// What a hook gets to see. Read-only.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Current hook point.
    pub point: HookPoint,
    /// The agent whose server fired the hook.
    pub agent: AgentId,
    /// Turns completed before this event.
    pub turn: u64,
    /// Id of the signal being processed or dropped.
    pub signal_id: Option<SignalId>,
    /// Type of that signal.
    pub signal_type: Option<String>,
    /// Kind of the effect involved (`EffectFailed`).
    pub effect: Option<String>,
    /// Index of that effect within the turn.
    pub effect_index: Option<usize>,
    /// Error class and message (`EffectFailed`, `SignalDropped`, `RunnerPanicked`).
    pub error: Option<(ErrorKind, String)>,
    /// New mode (`ModeChanged`).
    pub mode: Option<String>,
    /// Number of effects the turn produced (`TurnCompleted`).
    pub effect_count: Option<usize>,
    /// Full trace (`Trace`).
    pub trace: Option<TurnTrace>,
}

impl HookContext {
    /// Create a context with only the point and agent set.
    pub fn new(point: HookPoint, agent: AgentId, turn: u64) -> Self {
        Self {
            point,
            agent,
            turn,
            signal_id: None,
            signal_type: None,
            effect: None,
            effect_index: None,
            error: None,
            mode: None,
            effect_count: None,
            trace: None,
        }
    }

    /// Attach the signal being processed.
    pub fn with_signal(mut self, signal: &Signal) -> Self {
        self.signal_id = Some(signal.id.clone());
        self.signal_type = Some(signal.signal_type.clone());
        self
    }

    /// Attach the failing effect.
    pub fn with_effect(mut self, effect: &Effect, index: usize) -> Self {
        self.effect = Some(effect.kind().to_owned());
        self.effect_index = Some(index);
        self
    }

    /// Attach an error report.
    pub fn with_error(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.error = Some((kind, message.into()));
        self
    }

    /// Attach a mode name.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Attach the number of effects a turn produced.
    pub fn with_effect_count(mut self, count: usize) -> Self {
        self.effect_count = Some(count);
        self
    }

    /// Attach a full turn trace.
    pub fn with_trace(mut self, trace: TurnTrace) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// An observer of the turn loop.
///
/// Hooks are registered on the server by whoever assembles it; the
/// runner never knows who is watching. Hooks cannot change what the
/// server does. They should return quickly: the worker awaits them
/// between turns.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Which points this hook fires at.
    fn points(&self) -> &[HookPoint];

    /// Called at each registered point. An error is logged and ignored.
    async fn on_event(&self, ctx: &HookContext) -> Result<(), HookError>;
}
