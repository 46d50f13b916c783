//! RecordingHook — records every event it sees.

use crate::error::{ErrorKind, HookError};
use crate::hook::{Hook, HookContext, HookPoint};
use async_trait::async_trait;
use std::sync::Mutex;

/// A recorded hook event for inspection in tests.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// The hook point that fired.
    pub point: HookPoint,
    /// Turns completed at the time of the event.
    pub turn: u64,
    /// Type of the signal involved, if any.
    pub signal_type: Option<String>,
    /// Kind of the effect involved, if any.
    pub effect: Option<String>,
    /// Error report, if any.
    pub error: Option<(ErrorKind, String)>,
    /// Whether a full trace was attached.
    pub traced: bool,
}

/// A hook that records every event. Use `.events()` to inspect them.
pub struct RecordingHook {
    points: Vec<HookPoint>,
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingHook {
    /// Create a hook that fires at every hook point.
    pub fn new() -> Self {
        Self::at(&HookPoint::ALL)
    }

    /// Create a hook that fires only at `points`.
    pub fn at(points: &[HookPoint]) -> Self {
        Self {
            points: points.to_vec(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// A snapshot of all recorded events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Recorded events at one point.
    pub fn events_at(&self, point: HookPoint) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.point == point)
            .collect()
    }
}

impl Default for RecordingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for RecordingHook {
    fn points(&self) -> &[HookPoint] {
        &self.points
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<(), HookError> {
        self.events.lock().unwrap().push(RecordedEvent {
            point: ctx.point,
            turn: ctx.turn,
            signal_type: ctx.signal_type.clone(),
            effect: ctx.effect.clone(),
            error: ctx.error.clone(),
            traced: ctx.trace.is_some(),
        });
        Ok(())
    }
}
