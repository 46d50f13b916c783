//! The worker: sole owner of one agent and its session.
//!
//! A worker alternates between draining its command channel and running
//! turns. Commands are always drained before the next turn, so deliveries
//! enqueue (or overflow) in arrival order and mode changes take effect
//! at the next turn boundary. Turns never overlap.

use crate::actions::ActionTasks;
use crate::config::{Mode, ServerConfig, Status};
use crate::error::ServerError;
use crate::handle::{AgentInfo, Command};
use crate::queue::{Queued, SignalQueue};
use crate::timers::TimerTable;
use axon_core::hook::{HookContext, HookPoint, TurnTrace};
use axon_core::{
    ActionRegistry, Agent, ChildRef, ChildSupervisor, ChildTag, CorrelationId, DispatchAdapter,
    Effect, ErrorKind, ReplayLog, Signal, SignalPattern, StopReason, TurnRecord,
};
use axon_hooks::HookRegistry;
use serde_json::json;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Type of the synthetic signal that stands in as the cause of effects
/// returned by the agent's `mount` hook.
pub const MOUNT_SIGNAL: &str = "axon.mount";

pub(crate) struct Collaborators {
    pub(crate) registry: ActionRegistry,
    pub(crate) dispatcher: Option<Arc<dyn DispatchAdapter>>,
    pub(crate) supervisor: Arc<dyn ChildSupervisor>,
    pub(crate) hooks: HookRegistry,
    pub(crate) replay: Option<Arc<dyn ReplayLog>>,
}

pub(crate) struct Worker {
    pub(crate) agent: Agent,
    pub(crate) config: ServerConfig,
    pub(crate) mode: Mode,
    pub(crate) status: Status,
    pub(crate) queue: SignalQueue,
    pub(crate) turns: u64,
    pub(crate) registry: ActionRegistry,
    pub(crate) dispatcher: Option<Arc<dyn DispatchAdapter>>,
    pub(crate) supervisor: Arc<dyn ChildSupervisor>,
    pub(crate) hooks: HookRegistry,
    pub(crate) replay: Option<Arc<dyn ReplayLog>>,
    pub(crate) commands: mpsc::WeakUnboundedSender<Command>,
    pub(crate) timers: TimerTable,
    pub(crate) actions: ActionTasks,
    pub(crate) children: BTreeMap<ChildTag, ChildRef>,
    pub(crate) subscriptions: Vec<(SignalPattern, Arc<dyn DispatchAdapter>)>,
    pub(crate) pending_calls: HashMap<CorrelationId, oneshot::Sender<Result<Signal, ServerError>>>,
}

impl Worker {
    pub(crate) fn new(
        agent: Agent,
        config: ServerConfig,
        collaborators: Collaborators,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            agent,
            mode: config.mode,
            status: Status::Idle,
            queue: SignalQueue::new(config.max_queue_size),
            turns: 0,
            registry: collaborators.registry,
            dispatcher: collaborators.dispatcher,
            supervisor: collaborators.supervisor,
            hooks: collaborators.hooks,
            replay: collaborators.replay,
            commands,
            timers: TimerTable::default(),
            actions: ActionTasks::default(),
            children: BTreeMap::new(),
            subscriptions: Vec::new(),
            pending_calls: HashMap::new(),
            config,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mount_effects: Vec<Effect>,
    ) {
        tracing::info!(
            agent = %self.agent.id(),
            runner = self.agent.runner_name(),
            mode = %self.mode,
            "axon.server.started"
        );
        if !mount_effects.is_empty() {
            let cause = Signal::new(MOUNT_SIGNAL, json!({}))
                .with_source(self.agent.id().as_str())
                .with_target(self.agent.id().as_str());
            self.execute(&cause, &mount_effects).await;
        }

        let mut streak = 0usize;
        loop {
            while let Ok(command) = commands.try_recv() {
                if self.handle(command).await.is_break() {
                    return;
                }
            }
            if self.should_drain() {
                self.turn().await;
                streak += 1;
                if streak >= self.config.max_turns_per_drain.max(1) {
                    streak = 0;
                    tokio::task::yield_now().await;
                }
                continue;
            }
            streak = 0;
            match commands.recv().await {
                Some(command) => {
                    if self.handle(command).await.is_break() {
                        return;
                    }
                }
                None => {
                    self.shutdown(StopReason::Shutdown).await;
                    return;
                }
            }
        }
    }

    fn should_drain(&self) -> bool {
        !self.mode.is_stepping() && self.status.can_turn() && !self.queue.is_empty()
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Deliver { signal, reply } => {
                let result = self.enqueue(signal, false).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Call { signal, reply } => {
                let Some(correlation_id) = signal.correlation_id.clone() else {
                    let _ = reply.send(Err(ServerError::Internal(
                        "call without correlation id".into(),
                    )));
                    return ControlFlow::Continue(());
                };
                if self.pending_calls.contains_key(&correlation_id) {
                    let _ = reply.send(Err(ServerError::DuplicateCall(correlation_id)));
                    return ControlFlow::Continue(());
                }
                match self.enqueue(signal, true).await {
                    Ok(()) => {
                        self.pending_calls.insert(correlation_id, reply);
                    }
                    Err(error) => {
                        let _ = reply.send(Err(error));
                    }
                }
            }
            Command::CancelCall { correlation_id } => {
                self.pending_calls.remove(&correlation_id);
            }
            Command::SetMode { mode, reply } => {
                let result = mode.parse::<Mode>();
                if let Ok(mode) = result {
                    self.set_mode(mode).await;
                }
                let _ = reply.send(result);
            }
            Command::Step { reply } => {
                let result = self.step().await;
                let _ = reply.send(result);
            }
            Command::GetState { reply } => {
                let _ = reply.send(self.agent.clone());
            }
            Command::Info { reply } => {
                let _ = reply.send(self.info());
            }
            Command::Pause { reply } => {
                let result = match self.status {
                    Status::Idle | Status::Paused => {
                        self.status = Status::Paused;
                        Ok(())
                    }
                    status => Err(ServerError::InvalidState { status }),
                };
                let _ = reply.send(result);
            }
            Command::Resume { reply } => {
                let result = match self.status {
                    Status::Idle | Status::Paused | Status::Error => {
                        self.status = Status::Idle;
                        Ok(())
                    }
                    status => Err(ServerError::InvalidState { status }),
                };
                let _ = reply.send(result);
            }
            Command::Subscribe {
                pattern,
                subscriber,
                reply,
            } => {
                match self.subscriptions.iter_mut().find(|(p, _)| *p == pattern) {
                    Some(existing) => existing.1 = subscriber,
                    None => self.subscriptions.push((pattern, subscriber)),
                }
                let _ = reply.send(());
            }
            Command::Unsubscribe { pattern, reply } => {
                let before = self.subscriptions.len();
                self.subscriptions.retain(|(p, _)| *p != pattern);
                let _ = reply.send(self.subscriptions.len() != before);
            }
            Command::Stop { reason, reply } => {
                self.shutdown(reason).await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            Command::ActionFinished { task, signal } => {
                self.actions.finish(task);
                let _ = self.enqueue(signal, false).await;
            }
            Command::TimerFired {
                key,
                generation,
                signal,
            } => {
                if self.timers.fire(&key, generation) {
                    let _ = self.enqueue(signal, false).await;
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Append to the queue. Overflow leaves the queue untouched and is
    /// reported to the hooks as well as returned.
    pub(crate) async fn enqueue(&mut self, signal: Signal, call: bool) -> Result<(), ServerError> {
        let Err(error) = self.queue.push(signal.clone(), call) else {
            return Ok(());
        };
        tracing::warn!(
            agent = %self.agent.id(),
            signal = %signal.signal_type,
            %error,
            "axon.signal.dropped"
        );
        let ctx = self
            .hook(HookPoint::SignalDropped)
            .with_signal(&signal)
            .with_error(error.kind(), error.to_string());
        self.hooks.dispatch(&ctx).await;
        Err(error)
    }

    async fn set_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        tracing::info!(agent = %self.agent.id(), %mode, "axon.mode.changed");
        let ctx = self.hook(HookPoint::ModeChanged).with_mode(mode.as_str());
        self.hooks.dispatch(&ctx).await;
    }

    async fn step(&mut self) -> Result<bool, ServerError> {
        if !self.status.can_turn() {
            return Err(ServerError::InvalidState {
                status: self.status,
            });
        }
        if self.queue.is_empty() {
            return Ok(false);
        }
        self.turn().await;
        Ok(true)
    }

    /// One turn: dequeue, decide, commit, execute effects in order.
    async fn turn(&mut self) {
        let Some(Queued { signal, call }) = self.queue.pop() else {
            return;
        };
        self.status = Status::Running;
        self.turns += 1;
        let turn = self.turns;
        tracing::debug!(
            agent = %self.agent.id(),
            turn,
            signal = %signal.signal_type,
            "axon.turn.start"
        );
        let ctx = self.hook(HookPoint::TurnStarted).with_signal(&signal);
        self.hooks.dispatch(&ctx).await;

        let before = self.agent.clone();
        let decided = panic::catch_unwind(AssertUnwindSafe(|| before.handle_signal(&signal)));
        let (next, effects) = match decided {
            Ok(Ok(decided)) => decided,
            Ok(Err(error)) => {
                tracing::warn!(
                    agent = %self.agent.id(),
                    turn,
                    signal = %signal.signal_type,
                    %error,
                    "axon.turn.rejected"
                );
                let ctx = self
                    .hook(HookPoint::EffectFailed)
                    .with_signal(&signal)
                    .with_error(error.kind(), error.to_string());
                self.hooks.dispatch(&ctx).await;
                self.fail_call(call, &signal, ServerError::Internal(error.to_string()));
                self.status = Status::Idle;
                return;
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    agent = %self.agent.id(),
                    turn,
                    signal = %signal.signal_type,
                    error = %message,
                    "axon.runner.panicked"
                );
                let ctx = self
                    .hook(HookPoint::RunnerPanicked)
                    .with_signal(&signal)
                    .with_error(ErrorKind::Internal, message.clone());
                self.hooks.dispatch(&ctx).await;
                self.fail_call(
                    call,
                    &signal,
                    ServerError::Internal(format!("runner panicked: {message}")),
                );
                self.status = Status::Error;
                return;
            }
        };

        let changed = next.state() != before.state();
        self.agent = next;

        if let Some(log) = &self.replay {
            log.append(TurnRecord::new(
                self.agent.id().clone(),
                turn,
                before.state().clone(),
                signal.clone(),
                effects.clone(),
                self.agent.state().clone(),
            )
            .with_routes(before.routes().to_vec()))
            .await;
        }
        if self.mode == Mode::Debug && self.hooks.wants(HookPoint::Trace) {
            let trace = TurnTrace::new(
                before.state().clone(),
                self.agent.state().clone(),
                effects.clone(),
            );
            let ctx = self
                .hook(HookPoint::Trace)
                .with_signal(&signal)
                .with_trace(trace);
            self.hooks.dispatch(&ctx).await;
        }
        if call && effects.is_empty() && !changed {
            self.fail_call(
                true,
                &signal,
                ServerError::Routing(signal.signal_type.clone()),
            );
        }

        self.execute(&signal, &effects).await;

        tracing::debug!(
            agent = %self.agent.id(),
            turn,
            effects = effects.len(),
            "axon.turn.complete"
        );
        let ctx = self
            .hook(HookPoint::TurnCompleted)
            .with_signal(&signal)
            .with_effect_count(effects.len());
        self.hooks.dispatch(&ctx).await;
        self.status = Status::Idle;
    }

    fn fail_call(&mut self, call: bool, signal: &Signal, error: ServerError) {
        if !call {
            return;
        }
        let waiter = signal
            .correlation_id
            .as_ref()
            .and_then(|id| self.pending_calls.remove(id));
        if let Some(waiter) = waiter {
            let _ = waiter.send(Err(error));
        }
    }

    async fn shutdown(&mut self, reason: StopReason) {
        self.status = Status::Terminated;
        self.timers.cancel_all();
        self.actions.abort_all();
        for (tag, child) in std::mem::take(&mut self.children) {
            if let Err(error) = self.supervisor.stop(&child).await {
                tracing::warn!(
                    agent = %self.agent.id(),
                    child = %tag,
                    %error,
                    "axon.child.stop_failed"
                );
            }
        }
        for (_, waiter) in self.pending_calls.drain() {
            let _ = waiter.send(Err(ServerError::terminated()));
        }
        let dropped = self.queue.drain().count();
        self.agent.terminate(&reason);
        tracing::info!(
            agent = %self.agent.id(),
            %reason,
            turns = self.turns,
            dropped,
            "axon.server.stopped"
        );
    }

    fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.agent.id().clone(),
            status: self.status,
            mode: self.mode,
            queue_len: self.queue.len(),
            turns: self.turns,
            timers: self.timers.keys(),
            children: self.children.keys().cloned().collect(),
            actions_in_flight: self.actions.len(),
            pending_calls: self.pending_calls.len(),
            subscriptions: self.subscriptions.iter().map(|(p, _)| p.clone()).collect(),
        }
    }

    pub(crate) fn hook(&self, point: HookPoint) -> HookContext {
        HookContext::new(point, self.agent.id().clone(), self.turns)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
