//! RecordingDispatcher — keeps every delivered signal.

use crate::dispatch::{DispatchAdapter, Destination};
use crate::error::DispatchError;
use crate::signal::Signal;
use async_trait::async_trait;
use std::sync::Mutex;

/// A dispatch adapter that records deliveries. Destinations whose
/// adapter name is `fail` are rejected, for exercising error paths.
#[derive(Default)]
pub struct RecordingDispatcher {
    delivered: Mutex<Vec<(Signal, Destination)>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    pub fn delivered(&self) -> Vec<(Signal, Destination)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Types of the delivered signals, in order.
    pub fn signal_types(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .map(|(s, _)| s.signal_type)
            .collect()
    }
}

#[async_trait]
impl DispatchAdapter for RecordingDispatcher {
    async fn deliver(
        &self,
        signal: Signal,
        destination: &Destination,
    ) -> Result<(), DispatchError> {
        if destination.adapter == "fail" {
            return Err(DispatchError::DeliveryFailed(format!(
                "refused {}",
                signal.signal_type
            )));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((signal, destination.clone()));
        Ok(())
    }
}
