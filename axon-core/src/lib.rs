//! # axon-core — protocol types for a signal-driven agent runtime
//!
//! An agent is a pure decision step wrapped in a worker. The decision
//! step never performs I/O: it receives a [`Signal`] and the agent's
//! current state, and returns a new state plus a list of [`Effect`]s.
//! The worker (see `axon-server`) interprets those effects.
//!
//! ## The pieces
//!
//! | Piece | Type | What it does |
//! |-------|------|-------------|
//! | Message | [`Signal`] | Immutable envelope delivered to an agent |
//! | Intent | [`Effect`] | What the decision step wants to happen next |
//! | Work | [`Action`] | Possibly slow unit of work behind `Effect::Run` |
//! | Decision | [`Runner`] | Pure, deterministic `(state, signal) -> (state, effects)` |
//! | Snapshot | [`Agent`] | Id, state, schema, allowed actions, routes, runner |
//!
//! ## Collaborators
//!
//! | Boundary | Trait |
//! |----------|-------|
//! | Emit delivery | [`DispatchAdapter`] |
//! | Child work | [`ChildSupervisor`] |
//! | Turn journal | [`ReplayLog`] |
//! | Observability | [`Hook`] |
//!
//! State is a `serde_json::Value` object. Decision engines that need
//! scratch space keep it under the reserved [`state::RUNNER_FIELD`] so
//! the whole agent, including in-flight engine progress, is one value.

#![deny(missing_docs)]

pub mod action;
pub mod agent;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod hook;
pub mod id;
pub mod pattern;
pub mod replay;
pub mod runner;
pub mod signal;
pub mod state;
pub mod supervisor;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use action::{Action, ActionContext, ActionOutput, ActionRegistry, Directive};
pub use agent::{Agent, AgentBuilder, AgentHooks, FieldSpec, Schema, StopReason};
pub use dispatch::{DispatchAdapter, Destination};
pub use effect::{ChildSpec, Effect, Instruction, ModifyOp, RunOpts};
pub use error::{
    ActionError, DispatchError, ErrorKind, HookError, ReplayError, StateError, SupervisorError,
    ValidationError,
};
pub use hook::{Hook, HookContext, HookPoint, TurnTrace};
pub use id::{ActionName, AgentId, ChildRef, ChildTag, CorrelationId, SignalId, TimerKey};
pub use pattern::SignalPattern;
pub use replay::{MemoryReplayLog, ReplayLog, TurnRecord};
pub use runner::{Decision, Runner};
pub use signal::Signal;
pub use state::StatePath;
pub use supervisor::ChildSupervisor;
