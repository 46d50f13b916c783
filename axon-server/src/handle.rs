//! The client handle of a running agent server.

use crate::config::{Mode, Status};
use crate::error::ServerError;
use async_trait::async_trait;
use axon_core::{
    Agent, AgentId, ChildTag, CorrelationId, DispatchAdapter, DispatchError, Destination, Signal,
    SignalPattern, StopReason, TimerKey,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<T>;

/// Messages from handles (and from the worker's own background tasks)
/// to the worker. Only the worker mutates server state.
pub(crate) enum Command {
    Deliver {
        signal: Signal,
        reply: Option<Reply<Result<(), ServerError>>>,
    },
    Call {
        signal: Signal,
        reply: Reply<Result<Signal, ServerError>>,
    },
    CancelCall {
        correlation_id: CorrelationId,
    },
    SetMode {
        mode: String,
        reply: Reply<Result<Mode, ServerError>>,
    },
    Step {
        reply: Reply<Result<bool, ServerError>>,
    },
    GetState {
        reply: Reply<Agent>,
    },
    Info {
        reply: Reply<AgentInfo>,
    },
    Pause {
        reply: Reply<Result<(), ServerError>>,
    },
    Resume {
        reply: Reply<Result<(), ServerError>>,
    },
    Subscribe {
        pattern: SignalPattern,
        subscriber: Arc<dyn DispatchAdapter>,
        reply: Reply<()>,
    },
    Unsubscribe {
        pattern: SignalPattern,
        reply: Reply<bool>,
    },
    Stop {
        reason: StopReason,
        reply: Reply<()>,
    },
    ActionFinished {
        task: u64,
        signal: Signal,
    },
    TimerFired {
        key: TimerKey,
        generation: u64,
        signal: Signal,
    },
}

/// A point-in-time view of a server's session.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentInfo {
    /// The agent id.
    pub id: AgentId,
    /// Lifecycle status.
    pub status: Status,
    /// Execution mode.
    pub mode: Mode,
    /// Signals waiting in the queue.
    pub queue_len: usize,
    /// Turns completed so far.
    pub turns: u64,
    /// Keys of pending timers, sorted.
    pub timers: Vec<TimerKey>,
    /// Tags of tracked children, sorted.
    pub children: Vec<ChildTag>,
    /// Actions currently running.
    pub actions_in_flight: usize,
    /// Calls waiting for a reply.
    pub pending_calls: usize,
    /// Subscription patterns, in subscription order.
    pub subscriptions: Vec<SignalPattern>,
}

/// Handle to a running agent server.
///
/// Cheap to clone. Every method is a message to the worker; none of
/// them touches the agent directly. Once the server is stopped every
/// method fails with `invalid_state` (`terminated`).
#[derive(Clone)]
pub struct AgentRef {
    id: AgentId,
    commands: mpsc::UnboundedSender<Command>,
    call_timeout: Duration,
}

impl AgentRef {
    pub(crate) fn new(
        id: AgentId,
        commands: mpsc::UnboundedSender<Command>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            id,
            commands,
            call_timeout,
        }
    }

    /// The id of the hosted agent.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Whether the worker is still running.
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Enqueue a signal and wait for the worker to accept it.
    ///
    /// Fails with `queue_overflow` when the queue is full (the queue is
    /// left unchanged) and with a validation error for malformed signals.
    pub async fn deliver(&self, signal: Signal) -> Result<(), ServerError> {
        signal.validate()?;
        self.request(|reply| Command::Deliver {
            signal,
            reply: Some(reply),
        })
        .await?
    }

    /// Enqueue a signal without waiting for the worker. Overflow is
    /// reported to the server's hooks instead of the caller.
    pub fn send(&self, signal: Signal) -> Result<(), ServerError> {
        signal.validate()?;
        self.commands
            .send(Command::Deliver {
                signal,
                reply: None,
            })
            .map_err(|_| ServerError::terminated())
    }

    /// Deliver a request and wait for the `Reply` effect answering it,
    /// using the configured call timeout.
    pub async fn call(&self, signal: Signal) -> Result<Signal, ServerError> {
        self.call_with_timeout(signal, self.call_timeout).await
    }

    /// [`call`](Self::call) with an explicit timeout.
    ///
    /// The signal gets a fresh correlation id unless it already has one.
    /// A turn that handles the request without any effect and without
    /// changing state fails the call right away with `routing`.
    pub async fn call_with_timeout(
        &self,
        mut signal: Signal,
        timeout: Duration,
    ) -> Result<Signal, ServerError> {
        signal.validate()?;
        let correlation_id = signal
            .correlation_id
            .get_or_insert_with(CorrelationId::generate)
            .clone();
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Call { signal, reply })
            .map_err(|_| ServerError::terminated())?;
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ServerError::terminated()),
            Err(_) => {
                let _ = self.commands.send(Command::CancelCall { correlation_id });
                Err(ServerError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }

    /// Switch execution mode by name (`auto`, `step`, `debug`). Unknown
    /// names fail with `unsupported_mode` and leave the mode unchanged.
    /// Switching to `auto` drains whatever is queued.
    pub async fn set_mode(&self, mode: &str) -> Result<Mode, ServerError> {
        let mode = mode.to_owned();
        self.request(|reply| Command::SetMode { mode, reply }).await?
    }

    /// Process one queued signal. Returns whether a turn ran (`false`
    /// when the queue was empty). Fails with `invalid_state` while the
    /// server is paused or in error.
    pub async fn step(&self) -> Result<bool, ServerError> {
        self.request(|reply| Command::Step { reply }).await?
    }

    /// The current agent snapshot.
    pub async fn get_state(&self) -> Result<Agent, ServerError> {
        self.request(|reply| Command::GetState { reply }).await
    }

    /// Session counters and bookkeeping.
    pub async fn info(&self) -> Result<AgentInfo, ServerError> {
        self.request(|reply| Command::Info { reply }).await
    }

    /// Stop running turns. Signals are still accepted.
    pub async fn pause(&self) -> Result<(), ServerError> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    /// Leave the paused or error status.
    pub async fn resume(&self) -> Result<(), ServerError> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    /// Forward every emitted signal whose type matches `pattern` to
    /// `subscriber`. Subscribing the same pattern again replaces the
    /// earlier subscriber.
    pub async fn subscribe(
        &self,
        pattern: impl Into<SignalPattern>,
        subscriber: Arc<dyn DispatchAdapter>,
    ) -> Result<(), ServerError> {
        let pattern = pattern.into();
        self.request(|reply| Command::Subscribe {
            pattern,
            subscriber,
            reply,
        })
        .await
    }

    /// Drop the subscription under `pattern`. Returns whether one existed.
    pub async fn unsubscribe(&self, pattern: impl Into<SignalPattern>) -> Result<bool, ServerError> {
        let pattern = pattern.into();
        self.request(|reply| Command::Unsubscribe { pattern, reply })
            .await
    }

    /// Stop the server: cancel timers, abort running actions, stop
    /// children, fail pending calls, then run the agent's `terminate`
    /// hook. Returns once all of that is done.
    pub async fn stop(&self, reason: StopReason) -> Result<(), ServerError> {
        self.request(|reply| Command::Stop { reason, reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ServerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| ServerError::terminated())?;
        response.await.map_err(|_| ServerError::terminated())
    }
}

impl std::fmt::Debug for AgentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRef")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// An agent handle is itself a dispatch target: delivery is a
/// fire-and-forget [`send`](AgentRef::send), so agents can subscribe
/// each other without waiting on each other's workers.
#[async_trait]
impl DispatchAdapter for AgentRef {
    async fn deliver(&self, signal: Signal, _destination: &Destination) -> Result<(), DispatchError> {
        self.send(signal)
            .map_err(|e| DispatchError::DeliveryFailed(e.to_string()))
    }
}
