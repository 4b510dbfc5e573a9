//! Broadcast bus for session lifecycle notifications.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

/// Payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Fire-and-forget publication with any number of listeners.
pub trait EventBus<E: Event>: Send + Sync {
    /// Returns how many subscribers the event reached. Zero is not an error.
    fn emit(&self, event: E) -> usize;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-process bus. Slow subscribers lag rather than block publishers.
pub struct InMemoryBus<E: Event> {
    sender: broadcast::Sender<E>,
}

impl<E: Event> InMemoryBus<E> {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

impl<E: Event> EventBus<E> for InMemoryBus<E> {
    fn emit(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(err) => {
                trace!(event = ?err.0, "event dropped: no subscribers");
                0
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}
