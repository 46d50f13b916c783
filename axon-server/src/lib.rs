#![deny(missing_docs)]
//! # axon-server — the agent worker
//!
//! One [`AgentServer`] hosts one agent. Starting it spawns a worker task
//! that owns the agent snapshot, a bounded signal queue and all session
//! bookkeeping (timers, children, in-flight actions, pending calls).
//! Callers talk to it through the cloneable [`AgentRef`] handle.
//!
//! ## Turns
//!
//! A turn takes one signal off the queue, runs the agent's runner, commits
//! the new state and then executes the returned effects in order. Turns
//! never overlap. Actions, timers and children run on their own tasks and
//! report back by enqueueing signals, so a slow action never blocks the
//! queue.
//!
//! ## Modes
//!
//! | Mode | Behavior |
//! |------|----------|
//! | `auto` | The queue drains continuously |
//! | `step` | One turn per [`AgentRef::step`] |
//! | `debug` | Like `step`, plus a full trace to the hooks every turn |
//!
//! ## Errors
//!
//! Every failure carries an [`ErrorKind`](axon_core::ErrorKind).
//! Action failures become `action_error` signals for the runner to
//! handle. Effect failures halt the rest of the turn and fire the
//! `EffectFailed` hook. A panicking runner moves the server to
//! [`Status::Error`] until [`AgentRef::resume`].

mod actions;
pub mod children;
pub mod config;
pub mod directory;
pub mod error;
pub mod handle;
pub mod interpreter;
mod queue;
pub mod server;
mod timers;
mod worker;

pub use children::{ChildFuture, TaskSupervisor};
pub use config::{Mode, ServerConfig, Status};
pub use directory::{DIRECT_ADAPTER, DirectAdapter, Directory};
pub use error::{EffectError, ServerError};
pub use handle::{AgentInfo, AgentRef};
pub use interpreter::SUBSCRIPTION_ADAPTER;
pub use server::AgentServer;
pub use worker::MOUNT_SIGNAL;
