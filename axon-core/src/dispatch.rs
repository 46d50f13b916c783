//! The dispatch boundary — where emitted signals leave the agent.

use crate::error::DispatchError;
use crate::signal::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an emitted signal should go.
///
/// `adapter` names the transport (`log`, `channel`, `agent`, a broker,
/// a webhook); `config` is interpreted by that adapter alone.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Adapter name.
    pub adapter: String,
    /// Adapter-specific configuration.
    #[serde(default)]
    pub config: Value,
}

impl Destination {
    /// Create a destination with empty configuration.
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            config: Value::Null,
        }
    }

    /// Attach configuration.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

/// Delivers emitted signals.
///
/// Delivery semantics (at-most-once, acknowledgements, retries) are the
/// adapter's contract. Returning `Ok` means the adapter accepted the
/// signal, not that anyone processed it.
///
/// Implementations:
/// - LogAdapter: writes the signal to the log
/// - ChannelAdapter: pushes into an in-process channel
/// - DispatchRouter: picks an adapter by `Destination::adapter`
/// - DirectAdapter: delivers into another agent's queue
#[async_trait]
pub trait DispatchAdapter: Send + Sync {
    /// Deliver one signal.
    async fn deliver(&self, signal: Signal, destination: &Destination)
    -> Result<(), DispatchError>;
}
