//! Channel adapter.

use async_trait::async_trait;
use axon_core::{DispatchAdapter, DispatchError, Destination, Signal};
use tokio::sync::mpsc;

/// One delivery as seen by the receiving end of a [`ChannelAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// The emitted signal.
    pub signal: Signal,
    /// Where it was addressed.
    pub destination: Destination,
}

/// Pushes every emitted signal into a bounded tokio channel.
///
/// Delivery waits for channel capacity; a closed receiver fails the
/// delivery with [`DispatchError::DeliveryFailed`].
#[derive(Debug, Clone)]
pub struct ChannelAdapter {
    tx: mpsc::Sender<Dispatched>,
}

impl ChannelAdapter {
    /// Create an adapter and the receiver that drains it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Dispatched>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Wrap an existing sender.
    pub fn from_sender(tx: mpsc::Sender<Dispatched>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DispatchAdapter for ChannelAdapter {
    async fn deliver(&self, signal: Signal, destination: &Destination) -> Result<(), DispatchError> {
        self.tx
            .send(Dispatched {
                signal,
                destination: destination.clone(),
            })
            .await
            .map_err(|_| DispatchError::DeliveryFailed("channel receiver dropped".into()))
    }
}
