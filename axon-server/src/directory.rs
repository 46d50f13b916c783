//! Looking up agents by id, and delivering to them.

use crate::handle::AgentRef;
use async_trait::async_trait;
use axon_core::{AgentId, DispatchAdapter, DispatchError, Destination, Signal};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Name under which [`DirectAdapter`] is usually routed.
pub const DIRECT_ADAPTER: &str = "agent";

/// A shared registry of running agents. Clones share the same table.
#[derive(Clone, Default)]
pub struct Directory {
    agents: Arc<RwLock<BTreeMap<AgentId, AgentRef>>>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under its agent id, returning the one it replaced.
    pub fn register(&self, agent: AgentRef) -> Option<AgentRef> {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent.id().clone(), agent)
    }

    /// Remove a handle.
    pub fn unregister(&self, id: &AgentId) -> Option<AgentRef> {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Look up a handle.
    pub fn get(&self, id: &AgentId) -> Option<AgentRef> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory").field("agents", &self.ids()).finish()
    }
}

/// Delivers emitted signals straight into another agent's queue.
///
/// The target comes from `destination.config.agent`, falling back to
/// the signal's own `target`. Delivery is fire-and-forget: overflow at
/// the target is reported by the target's hooks, not here.
#[derive(Debug, Clone)]
pub struct DirectAdapter {
    directory: Directory,
}

impl DirectAdapter {
    /// Create an adapter resolving targets through `directory`.
    pub fn new(directory: Directory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl DispatchAdapter for DirectAdapter {
    async fn deliver(&self, signal: Signal, destination: &Destination) -> Result<(), DispatchError> {
        let target = destination
            .config
            .get("agent")
            .and_then(Value::as_str)
            .or(signal.target.as_deref())
            .map(str::to_owned)
            .ok_or_else(|| {
                DispatchError::InvalidDestination("no target agent in destination or signal".into())
            })?;
        let agent = self
            .directory
            .get(&AgentId::new(target.as_str()))
            .ok_or_else(|| DispatchError::DeliveryFailed(format!("no agent named {target}")))?;
        agent
            .send(signal.with_target(target))
            .map_err(|e| DispatchError::DeliveryFailed(e.to_string()))
    }
}
