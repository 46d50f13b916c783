//! Log adapter.

use async_trait::async_trait;
use axon_core::{DispatchAdapter, DispatchError, Destination, Signal};

/// Writes each emitted signal as a structured `tracing` event named
/// `axon.dispatch.log`.
///
/// The level comes from `destination.config.level` (`trace`, `debug`,
/// `info`, `warn` or `error`); anything else logs at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAdapter;

impl LogAdapter {
    /// Create a log adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DispatchAdapter for LogAdapter {
    async fn deliver(&self, signal: Signal, destination: &Destination) -> Result<(), DispatchError> {
        let level = destination
            .config
            .get("level")
            .and_then(|l| l.as_str())
            .unwrap_or("info");
        let id = signal.id.as_str();
        let signal_type = signal.signal_type.as_str();
        let source = signal.source.as_deref().unwrap_or_default();
        let data = &signal.data;
        match level {
            "trace" => tracing::trace!(id, signal_type, source, %data, "axon.dispatch.log"),
            "debug" => tracing::debug!(id, signal_type, source, %data, "axon.dispatch.log"),
            "warn" => tracing::warn!(id, signal_type, source, %data, "axon.dispatch.log"),
            "error" => tracing::error!(id, signal_type, source, %data, "axon.dispatch.log"),
            _ => tracing::info!(id, signal_type, source, %data, "axon.dispatch.log"),
        }
        Ok(())
    }
}
