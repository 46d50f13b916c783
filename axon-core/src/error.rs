//! Error types for each boundary.
//!
//! Every error maps onto one [`ErrorKind`]. The kind decides how the
//! runtime propagates it: action and timeout failures turn into signals,
//! validation and overflow failures go back to the caller, and internal
//! failures halt the remaining effects of a turn.

use crate::id::ActionName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The propagation class of an error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed signal, effect or state shape.
    Validation,
    /// A unit of work failed.
    Action,
    /// Something did not finish in time.
    Timeout,
    /// No transition or handler matched where a response was expected.
    Routing,
    /// A bounded queue was full.
    Overflow,
    /// Anything unclassified.
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name, used in signal payloads and hook reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Action => "action",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Routing => "routing",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed input rejected before it reaches a worker.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A signal was built with an empty type.
    #[error("signal type must not be empty")]
    EmptySignalType,

    /// Agent state must be a JSON object.
    #[error("agent state must be a JSON object, got {0}")]
    StateNotObject(String),

    /// A schema field marked required has no value and no default.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field is present but unusable.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// The offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Always [`ErrorKind::Validation`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Action execution errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action failed and retrying won't help.
    #[error("action failed: {0}")]
    Failed(String),

    /// The action failed but retrying might succeed.
    #[error("retryable: {0}")]
    Retryable(String),

    /// The action did not finish within its timeout.
    #[error("action {action} timed out after {timeout_ms}ms")]
    Timeout {
        /// The action that timed out.
        action: ActionName,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// No action is registered under this name.
    #[error("action not found: {0}")]
    NotFound(ActionName),

    /// The agent is not allowed to run this action.
    #[error("action not allowed for this agent: {0}")]
    NotAllowed(ActionName),

    /// The parameters were rejected by the action.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ActionError {
    /// Whether the run loop may retry the invocation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Retryable(_))
    }

    /// The propagation class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Action,
        }
    }
}

/// Errors while folding a state modification into an agent's state.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    /// A path segment walked into something that is not an object.
    #[error("cannot descend into non-object at {path}")]
    NotAnObject {
        /// The dotted path where the walk stopped.
        path: String,
    },

    /// A path could not be parsed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The result is not a valid agent state.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StateError {
    /// Folding failures are internal; validation failures keep their kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StateError::Validation(e) => e.kind(),
            _ => ErrorKind::Internal,
        }
    }
}

/// Dispatch adapter errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No adapter is registered under the destination's adapter name.
    #[error("unknown dispatch adapter: {0}")]
    UnknownAdapter(String),

    /// The destination configuration is unusable.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// The adapter accepted the signal but could not deliver it.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Always [`ErrorKind::Internal`]; a failed emit halts the turn.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Child supervisor errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The supervisor has no factory for this child kind.
    #[error("unknown child kind: {0}")]
    UnknownKind(String),

    /// Starting the child failed.
    #[error("child start failed: {0}")]
    StartFailed(String),

    /// Stopping the child failed.
    #[error("child stop failed: {0}")]
    StopFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SupervisorError {
    /// Always [`ErrorKind::Internal`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Hook errors. These are logged but never halt a turn.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook execution failed.
    #[error("hook failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised while replaying a recorded turn.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The runner produced different effects than the record holds.
    #[error("replayed effects diverge from the record at index {index}")]
    EffectsDiverged {
        /// First index where the lists differ.
        index: usize,
    },

    /// The replayed state differs from the recorded `state_after`.
    #[error("replayed state diverges from the recorded state")]
    StateDiverged,

    /// Folding the recorded effects failed.
    #[error(transparent)]
    State(#[from] StateError),
}

impl ReplayError {
    /// Always [`ErrorKind::Internal`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
