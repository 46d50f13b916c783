//! Turn journal — the hook point for offline replay.

use crate::effect::Effect;
use crate::id::{ActionName, AgentId};
use crate::pattern::SignalPattern;
use crate::signal::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything needed to re-run one turn.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// The agent the turn belongs to.
    pub agent: AgentId,
    /// Sequence number of the turn, starting at 1.
    pub turn: u64,
    /// State when the signal was dequeued.
    pub state_before: Value,
    /// The signal.
    pub signal: Signal,
    /// Effects the runner returned.
    pub effects: Vec<Effect>,
    /// State committed by the turn.
    pub state_after: Value,
    /// Route table in force when the signal was handled. Replay resolves
    /// routed signals against it, not against the replaying agent's.
    #[serde(default)]
    pub routes: Vec<(SignalPattern, ActionName)>,
}

impl TurnRecord {
    /// Create a record.
    pub fn new(
        agent: AgentId,
        turn: u64,
        state_before: Value,
        signal: Signal,
        effects: Vec<Effect>,
        state_after: Value,
    ) -> Self {
        Self {
            agent,
            turn,
            state_before,
            signal,
            effects,
            state_after,
            routes: Vec::new(),
        }
    }

    /// Record the route table the turn ran with.
    pub fn with_routes(mut self, routes: Vec<(SignalPattern, ActionName)>) -> Self {
        self.routes = routes;
        self
    }
}

/// Append-only journal of turns.
///
/// Servers append one record per committed turn when a log is
/// configured. Nothing in the runtime reads it back; it exists for
/// replay and audit tools.
#[async_trait]
pub trait ReplayLog: Send + Sync {
    /// Append a record.
    async fn append(&self, record: TurnRecord);
}

/// In-memory journal. Suitable for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryReplayLog {
    records: Mutex<Vec<TurnRecord>>,
}

impl MemoryReplayLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every record so far.
    pub fn records(&self) -> Vec<TurnRecord> {
        self.lock().clone()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TurnRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ReplayLog for MemoryReplayLog {
    async fn append(&self, record: TurnRecord) {
        self.lock().push(record);
    }
}
