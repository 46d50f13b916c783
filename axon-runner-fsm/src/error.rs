//! Configuration errors.

use axon_core::ErrorKind;
use thiserror::Error;

/// Why a machine could not be built.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsmError {
    /// No states were declared.
    #[error("state machine declares no states")]
    NoStates,

    /// No initial state was given.
    #[error("state machine has no initial state")]
    NoInitialState,

    /// A state name was declared twice.
    #[error("state {0:?} is declared more than once")]
    DuplicateState(String),

    /// The initial state is not declared.
    #[error("initial state {0:?} is not declared")]
    UnknownInitialState(String),

    /// A transition references an undeclared state.
    #[error("transition {index} ({event}) references undeclared state {state:?}")]
    UnknownState {
        /// Position of the transition in declaration order.
        index: usize,
        /// The transition's event.
        event: String,
        /// The undeclared state.
        state: String,
    },

    /// A transition has no source states.
    #[error("transition {index} ({event}) has no source states")]
    NoSourceStates {
        /// Position of the transition in declaration order.
        index: usize,
        /// The transition's event.
        event: String,
    },

    /// The status path is the state root.
    #[error("state key must not be empty")]
    EmptyStateKey,
}

impl FsmError {
    /// Every configuration error is a validation failure.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
