#![deny(missing_docs)]
//! # axon — umbrella crate
//!
//! One import surface for the axon agent runtime. Re-exports the
//! protocol crate and the implementations behind feature flags, plus a
//! `prelude` for the happy path.

#[cfg(feature = "core")]
pub use axon_core;
#[cfg(feature = "dispatch")]
pub use axon_dispatch;
#[cfg(feature = "hooks")]
pub use axon_hooks;
#[cfg(feature = "runner-fsm")]
pub use axon_runner_fsm;
#[cfg(feature = "runner-simple")]
pub use axon_runner_simple;
#[cfg(feature = "server")]
pub use axon_server;

/// Happy-path imports for wiring agents.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use axon_core::{
        Action, ActionContext, ActionError, ActionOutput, ActionRegistry, Agent, AgentHooks,
        ChildSpec, Decision, Destination, DispatchAdapter, Effect, ErrorKind, Hook, HookPoint,
        Instruction, Runner, RunOpts, Schema, Signal, SignalPattern, StopReason,
    };

    #[cfg(feature = "hooks")]
    pub use axon_hooks::{HookRegistry, TracingHook};

    #[cfg(feature = "server")]
    pub use axon_server::{AgentRef, AgentServer, Mode, ServerConfig, ServerError, Status};

    #[cfg(feature = "dispatch")]
    pub use axon_dispatch::{ChannelAdapter, DispatchRouter, LogAdapter};

    #[cfg(feature = "runner-simple")]
    pub use axon_runner_simple::SimpleRunner;

    #[cfg(feature = "runner-fsm")]
    pub use axon_runner_fsm::{StateMachine, Transition};
}
