//! Fan-out bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;
use tracing::trace;

use super::{PublishError, Publisher, SyncEvent};

pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Push-based bus: every receiver obtained from `subscribe()` gets every
/// event published after it subscribed.
///
/// A receiver that falls more than `capacity` events behind skips the oldest
/// ones (`RecvError::Lagged`). Publishing with no receivers is not an error.
#[derive(Clone, Debug)]
pub struct BroadcastBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Publisher for BroadcastBus {
    fn publish(&self, event: SyncEvent) -> Result<(), PublishError> {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => trace!(event_type, receivers, "Broadcast sync event"),
            Err(_) => trace!(event_type, "No listeners for sync event"),
        }
        Ok(())
    }
}
