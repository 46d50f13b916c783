//! Signals — the immutable message envelope.

use crate::effect::Instruction;
use crate::error::{ActionError, ValidationError};
use crate::id::{AgentId, CorrelationId, SignalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal types the runtime synthesizes on its own.
pub mod types {
    /// An action started by `Effect::Run` completed successfully.
    pub const ACTION_RESULT: &str = "action_result";
    /// An action started by `Effect::Run` failed.
    pub const ACTION_ERROR: &str = "action_error";
    /// An action exceeded its `RunOpts::timeout_ms`.
    pub const TIMEOUT_FIRED: &str = "timeout_fired";
}

/// An immutable message envelope.
///
/// Signals are the only thing that crosses from one agent to another.
/// A signal is never mutated after construction; the `with_*` builders
/// consume `self` and are meant for the moment of creation only.
/// Equality is by value, so two signals with the same id and fields
/// compare equal.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Unique id.
    pub id: SignalId,
    /// Namespaced type, e.g. `order.placed`.
    #[serde(rename = "type")]
    pub signal_type: String,
    /// Who produced the signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Who the signal is addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Pairs a request with its reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Structured payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Create a signal with a fresh id and the current time.
    pub fn new(signal_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: SignalId::generate(),
            signal_type: signal_type.into(),
            source: None,
            target: None,
            correlation_id: None,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Set the origin.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the destination.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Override the generated id. Useful for deterministic fixtures.
    pub fn with_id(mut self, id: impl Into<SignalId>) -> Self {
        self.id = id.into();
        self
    }

    /// Override the creation time. Useful for deterministic fixtures.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check the envelope's shape. Payloads are not validated here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signal_type.trim().is_empty() {
            return Err(ValidationError::EmptySignalType);
        }
        Ok(())
    }

    /// Whether this signal's type is `signal_type`.
    pub fn is(&self, signal_type: &str) -> bool {
        self.signal_type == signal_type
    }

    /// Build the reply to this signal: same correlation id, source and
    /// target swapped.
    pub fn reply(&self, signal_type: impl Into<String>, data: serde_json::Value) -> Signal {
        let mut reply = Signal::new(signal_type, data);
        reply.correlation_id = self.correlation_id.clone();
        reply.source = self.target.clone();
        reply.target = self.source.clone();
        reply
    }

    /// The `action_result` signal for a completed action. The payload
    /// carries `action`, `result`, `directives` and the `instruction`
    /// (`action`, `params`, `context`) that was run.
    pub fn action_result(
        agent: &AgentId,
        instruction: &Instruction,
        result: serde_json::Value,
        directives: serde_json::Value,
        cause: &Signal,
    ) -> Signal {
        Signal::new(
            types::ACTION_RESULT,
            serde_json::json!({
                "action": instruction.action,
                "result": result,
                "directives": directives,
                "instruction": instruction_payload(instruction),
            }),
        )
        .caused_by(agent, cause)
    }

    /// The `action_error` (or `timeout_fired`, for timeouts) signal for a
    /// failed action. Same shape as `action_result`, with `kind` and
    /// `error` in place of `result` and an empty `directives` list.
    pub fn action_error(
        agent: &AgentId,
        instruction: &Instruction,
        error: &ActionError,
        cause: &Signal,
    ) -> Signal {
        let signal_type = match error {
            ActionError::Timeout { .. } => types::TIMEOUT_FIRED,
            _ => types::ACTION_ERROR,
        };
        let mut data = serde_json::json!({
            "action": instruction.action,
            "kind": error.kind(),
            "error": error.to_string(),
            "directives": [],
            "instruction": instruction_payload(instruction),
        });
        if let ActionError::Timeout { timeout_ms, .. } = error {
            data["timeout_ms"] = serde_json::json!(timeout_ms);
        }
        Signal::new(signal_type, data).caused_by(agent, cause)
    }

    /// Address a runtime-synthesized signal back at `agent`, carrying the
    /// correlation id of the signal that caused it.
    fn caused_by(mut self, agent: &AgentId, cause: &Signal) -> Signal {
        self.source = Some(agent.to_string());
        self.target = Some(agent.to_string());
        self.correlation_id = cause.correlation_id.clone();
        self
    }
}

fn instruction_payload(instruction: &Instruction) -> serde_json::Value {
    serde_json::json!({
        "action": instruction.action,
        "params": instruction.params,
        "context": instruction.context,
    })
}
