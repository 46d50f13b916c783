//! Assembling and starting an agent server.

use crate::children::TaskSupervisor;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handle::AgentRef;
use crate::worker::{Collaborators, Worker};
use axon_core::{
    Action, ActionRegistry, Agent, ChildSupervisor, DispatchAdapter, Hook, ReplayLog,
};
use axon_hooks::HookRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Builder for one agent server.
///
/// Everything the worker talks to is injected here: the action
/// registry, the dispatcher for emitted signals, the child supervisor,
/// hooks and an optional replay log. Nothing is looked up globally.
///
/// ```rust,ignore
/// let agent = AgentServer::new(agent)
///     .config(ServerConfig::default().with_max_queue_size(64))
///     .action(Arc::new(Lookup))
///     .dispatcher(Arc::new(LogAdapter::new()))
///     .start()?;
/// agent.deliver(Signal::new("order.placed", json!({}))).await?;
/// ```
pub struct AgentServer {
    agent: Agent,
    config: ServerConfig,
    registry: ActionRegistry,
    dispatcher: Option<Arc<dyn DispatchAdapter>>,
    supervisor: Option<Arc<dyn ChildSupervisor>>,
    hooks: HookRegistry,
    replay: Option<Arc<dyn ReplayLog>>,
}

impl AgentServer {
    /// Start assembling a server for `agent`.
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            config: ServerConfig::default(),
            registry: ActionRegistry::new(),
            dispatcher: None,
            supervisor: None,
            hooks: HookRegistry::new(),
            replay: None,
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the action registry.
    pub fn actions(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register one action.
    pub fn action(mut self, action: Arc<dyn Action>) -> Self {
        self.registry.register(action);
        self
    }

    /// Set the adapter emitted signals are delivered through. Without
    /// one, emitting to a destination fails the effect.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn DispatchAdapter>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the child supervisor. Defaults to a [`TaskSupervisor`] that
    /// knows no kinds.
    pub fn supervisor(mut self, supervisor: Arc<dyn ChildSupervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Add a hook.
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Replace the hook registry.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Journal every committed turn to `log`.
    pub fn replay_log(mut self, log: Arc<dyn ReplayLog>) -> Self {
        self.replay = Some(log);
        self
    }

    /// Mount the agent and spawn its worker on the current tokio runtime.
    ///
    /// Mount effects run on the worker before it takes any command.
    /// Fails if mounting does not produce a valid state.
    pub fn start(self) -> Result<AgentRef, ServerError> {
        let (agent, mount_effects) = self.agent.mount()?;
        let id = agent.id().clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let call_timeout = Duration::from_millis(self.config.call_timeout_ms);
        let collaborators = Collaborators {
            registry: self.registry,
            dispatcher: self.dispatcher,
            supervisor: self
                .supervisor
                .unwrap_or_else(|| Arc::new(TaskSupervisor::new())),
            hooks: self.hooks,
            replay: self.replay,
        };
        let worker = Worker::new(agent, self.config, collaborators, tx.downgrade());
        let span = tracing::info_span!("axon.agent", agent = %id);
        tokio::spawn(worker.run(rx, mount_effects).instrument(span));
        Ok(AgentRef::new(id, tx, call_timeout))
    }
}

impl std::fmt::Debug for AgentServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentServer")
            .field("agent", &self.agent.id())
            .field("config", &self.config)
            .field("actions", &self.registry.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
