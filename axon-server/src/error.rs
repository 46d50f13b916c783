//! Server errors.

use crate::config::Status;
use axon_core::{
    ActionName, CorrelationId, DispatchError, ErrorKind, StateError, SupervisorError,
    ValidationError,
};
use thiserror::Error;

/// Errors returned to callers of an [`AgentRef`](crate::AgentRef).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ServerError {
    /// The signal queue is full. The queue is unchanged.
    #[error("queue overflow: {capacity} signals already queued")]
    QueueOverflow {
        /// Configured capacity.
        capacity: usize,
    },

    /// The command is not allowed in the server's current status.
    #[error("invalid state: server is {status}")]
    InvalidState {
        /// Status at the time of the command.
        status: Status,
    },

    /// No such execution mode.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// A call got no reply in time.
    #[error("call timed out after {0}ms")]
    Timeout(u64),

    /// A call's signal was handled without any outcome that could reply.
    #[error("no handler produced a response for {0}")]
    Routing(String),

    /// Another call with this correlation id is still waiting for its reply.
    #[error("a call with correlation id {0} is already pending")]
    DuplicateCall(CorrelationId),

    /// The inbound signal is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Mounting the agent failed.
    #[error("mount failed: {0}")]
    Mount(#[from] StateError),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// The propagation class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::QueueOverflow { .. } => ErrorKind::Overflow,
            ServerError::InvalidState { .. }
            | ServerError::UnsupportedMode(_)
            | ServerError::DuplicateCall(_)
            | ServerError::Validation(_) => ErrorKind::Validation,
            ServerError::Timeout(_) => ErrorKind::Timeout,
            ServerError::Routing(_) => ErrorKind::Routing,
            ServerError::Mount(e) => e.kind(),
            ServerError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn terminated() -> Self {
        ServerError::InvalidState {
            status: Status::Terminated,
        }
    }
}

/// Why executing one effect failed. Any of these halts the remaining
/// effects of the turn.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EffectError {
    /// The dispatch adapter rejected an emitted signal.
    #[error("emit failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// The child supervisor failed.
    #[error("supervisor failed: {0}")]
    Supervisor(#[from] SupervisorError),

    /// `RegisterAction` named an action the registry does not know.
    #[error("action {0} is not in the registry")]
    UnregisteredAction(ActionName),
}

impl EffectError {
    /// Always [`ErrorKind::Internal`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
