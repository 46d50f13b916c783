//! The bounded signal queue.

use crate::error::ServerError;
use axon_core::Signal;
use std::collections::VecDeque;

/// A queued signal. `call` marks signals enqueued by `AgentRef::call`,
/// whose waiter is keyed by the signal's correlation id.
#[derive(Debug)]
pub(crate) struct Queued {
    pub(crate) signal: Signal,
    pub(crate) call: bool,
}

/// Bounded FIFO. Pushing onto a full queue fails and leaves it untouched.
#[derive(Debug)]
pub(crate) struct SignalQueue {
    items: VecDeque<Queued>,
    capacity: usize,
}

impl SignalQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, signal: Signal, call: bool) -> Result<(), ServerError> {
        if self.items.len() >= self.capacity {
            return Err(ServerError::QueueOverflow {
                capacity: self.capacity,
            });
        }
        self.items.push_back(Queued { signal, call });
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<Queued> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Queued> + '_ {
        self.items.drain(..)
    }
}
