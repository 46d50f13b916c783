#![deny(missing_docs)]
//! In-process dispatch adapters for axon.
//!
//! Each adapter implements [`DispatchAdapter`]. A server holds exactly
//! one adapter; use a [`DispatchRouter`] to serve several destinations
//! from one server, keyed by [`Destination::adapter`].

mod channel;
mod log;

pub use channel::{ChannelAdapter, Dispatched};
pub use log::LogAdapter;

use async_trait::async_trait;
use axon_core::{DispatchAdapter, DispatchError, Destination, Signal};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Accepts every signal and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdapter;

#[async_trait]
impl DispatchAdapter for NoopAdapter {
    async fn deliver(
        &self,
        _signal: Signal,
        _destination: &Destination,
    ) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Routes each delivery to the adapter registered under the
/// destination's adapter name.
///
/// Unknown names fall back to the fallback adapter when one is set and
/// fail with [`DispatchError::UnknownAdapter`] otherwise.
#[derive(Clone, Default)]
pub struct DispatchRouter {
    adapters: BTreeMap<String, Arc<dyn DispatchAdapter>>,
    fallback: Option<Arc<dyn DispatchAdapter>>,
}

impl DispatchRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under `name`. Re-registering replaces.
    pub fn route(mut self, name: impl Into<String>, adapter: Arc<dyn DispatchAdapter>) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    /// Adapter for names nobody registered.
    pub fn fallback(mut self, adapter: Arc<dyn DispatchAdapter>) -> Self {
        self.fallback = Some(adapter);
        self
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

#[async_trait]
impl DispatchAdapter for DispatchRouter {
    async fn deliver(&self, signal: Signal, destination: &Destination) -> Result<(), DispatchError> {
        let adapter = self
            .adapters
            .get(&destination.adapter)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DispatchError::UnknownAdapter(destination.adapter.clone()))?;
        adapter.deliver(signal, destination).await
    }
}

impl std::fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRouter")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
