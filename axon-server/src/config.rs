//! Server configuration, execution modes and lifecycle status.

use crate::error::ServerError;
use axon_core::Destination;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the worker advances through its queue.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Drain the queue continuously.
    #[default]
    Auto,
    /// Process one queued signal per `step` command.
    Step,
    /// Like `Step`, and every turn is traced to the hooks.
    Debug,
}

impl Mode {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Step => "step",
            Mode::Debug => "debug",
        }
    }

    /// Whether turns only happen on explicit `step` commands.
    pub fn is_stepping(&self) -> bool {
        matches!(self, Mode::Step | Mode::Debug)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Mode::Auto),
            "step" => Ok(Mode::Step),
            "debug" => Ok(Mode::Debug),
            other => Err(ServerError::UnsupportedMode(other.to_owned())),
        }
    }
}

/// Where the worker is in its lifecycle.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting for work.
    Idle,
    /// Inside a turn.
    Running,
    /// A runner panicked. Signals are still accepted; turns resume after `resume`.
    Error,
    /// Paused by request. Signals are still accepted; no turns run.
    Paused,
    /// Stopped for good.
    Terminated,
}

impl Status {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Running => "running",
            Status::Error => "error",
            Status::Paused => "paused",
            Status::Terminated => "terminated",
        }
    }

    /// Whether a turn may start in this status.
    pub fn can_turn(&self) -> bool {
        matches!(self, Status::Idle)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static configuration for an agent server.
///
/// Deserializes with every field optional; missing fields take their
/// defaults.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Capacity of the signal queue.
    pub max_queue_size: usize,
    /// Mode at start.
    pub mode: Mode,
    /// Destination for `Emit` effects that name none.
    pub default_destination: Option<Destination>,
    /// Timeout for `call` when the caller gives none, in milliseconds.
    pub call_timeout_ms: u64,
    /// Consecutive turns after which the worker yields to the scheduler.
    pub max_turns_per_drain: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1024,
            mode: Mode::Auto,
            default_destination: None,
            call_timeout_ms: 5_000,
            max_turns_per_drain: 64,
        }
    }
}

impl ServerConfig {
    /// Set the queue capacity.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the starting mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the default emit destination.
    pub fn with_default_destination(mut self, destination: Destination) -> Self {
        self.default_destination = Some(destination);
        self
    }

    /// Set the default call timeout.
    pub fn with_call_timeout_ms(mut self, call_timeout_ms: u64) -> Self {
        self.call_timeout_ms = call_timeout_ms;
        self
    }

    /// Set the drain bound.
    pub fn with_max_turns_per_drain(mut self, max_turns_per_drain: usize) -> Self {
        self.max_turns_per_drain = max_turns_per_drain;
        self
    }
}
