//! The timer table.

use crate::handle::Command;
use axon_core::{Signal, TimerKey};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

struct Pending {
    generation: u64,
    handle: AbortHandle,
}

/// Pending timers by key. Every arming gets a fresh generation so a
/// timer that fired just before being replaced is recognized as stale.
#[derive(Default)]
pub(crate) struct TimerTable {
    pending: HashMap<TimerKey, Pending>,
    generation: u64,
    anonymous: u64,
}

impl TimerTable {
    /// Arm a timer, replacing any pending timer with the same key.
    /// Keyless timers get a generated key. Returns the key and whether
    /// an earlier timer was replaced.
    pub(crate) fn arm(
        &mut self,
        key: Option<TimerKey>,
        delay_ms: u64,
        signal: Signal,
        commands: mpsc::UnboundedSender<Command>,
    ) -> (TimerKey, bool) {
        let key = key.unwrap_or_else(|| {
            self.anonymous += 1;
            TimerKey::new(format!("__timer-{}", self.anonymous))
        });
        self.generation += 1;
        let generation = self.generation;
        let fired = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = commands.send(Command::TimerFired {
                key: fired,
                generation,
                signal,
            });
        });
        let previous = self.pending.insert(
            key.clone(),
            Pending {
                generation,
                handle: task.abort_handle(),
            },
        );
        if let Some(previous) = &previous {
            previous.handle.abort();
        }
        (key, previous.is_some())
    }

    /// Claim a fired timer. False when the timer was replaced or
    /// cancelled after it fired.
    pub(crate) fn fire(&mut self, key: &TimerKey, generation: u64) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    pub(crate) fn keys(&self) -> Vec<TimerKey> {
        let mut keys: Vec<TimerKey> = self.pending.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn rearming_a_key_replaces_the_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerTable::default();
        let (key, replaced) = timers.arm(
            Some("retry".into()),
            10_000,
            Signal::new("first", json!({})),
            tx.clone(),
        );
        assert!(!replaced);
        let (_, replaced) = timers.arm(Some(key.clone()), 10, Signal::new("second", json!({})), tx);
        assert!(replaced);
        assert_eq!(timers.keys(), vec![key.clone()]);

        let Some(Command::TimerFired {
            key: fired,
            generation,
            signal,
        }) = rx.recv().await
        else {
            panic!("expected a timer");
        };
        assert_eq!(fired, key);
        assert_eq!(signal.signal_type, "second");
        assert!(timers.fire(&fired, generation));
        assert!(timers.keys().is_empty());
    }

    #[tokio::test]
    async fn stale_generations_are_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerTable::default();
        timers.arm(Some("k".into()), 10_000, Signal::new("a", json!({})), tx.clone());
        timers.arm(Some("k".into()), 10_000, Signal::new("b", json!({})), tx);
        assert!(!timers.fire(&"k".into(), 1));
        assert!(timers.fire(&"k".into(), 2));
        timers.cancel_all();
    }

    #[tokio::test]
    async fn keyless_timers_get_distinct_keys() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerTable::default();
        let (a, _) = timers.arm(None, 10_000, Signal::new("a", json!({})), tx.clone());
        let (b, _) = timers.arm(None, 10_000, Signal::new("b", json!({})), tx);
        assert_ne!(a, b);
        assert_eq!(timers.keys().len(), 2);
        timers.cancel_all();
        assert!(timers.keys().is_empty());
    }
}
