use std::sync::Mutex;

use event_emitter_rs::EventEmitter;

use super::{PublishError, Publisher, SyncEvent};

/// A publisher that emits events via an `EventEmitter` for in-process listeners.
///
/// Each event is emitted under its type name (`stockSyncCompleted`,
/// `productsUpdated`, `productsRefreshed`) with the JSON form of the event as
/// payload. Listeners run on emitter threads, after `publish` returns.
pub struct EmitterPublisher {
    emitter: Mutex<EventEmitter>,
}

impl Default for EmitterPublisher {
    fn default() -> Self {
        Self::new(EventEmitter::new())
    }
}

impl EmitterPublisher {
    pub fn new(emitter: EventEmitter) -> Self {
        EmitterPublisher {
            emitter: Mutex::new(emitter),
        }
    }

    /// Register a listener for an event type. Returns the listener id.
    pub fn on<F>(&self, event_type: &str, listener: F) -> Result<String, PublishError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| PublishError::Poisoned("event emitter"))?;
        Ok(emitter.on(event_type, listener))
    }
}

impl Publisher for EmitterPublisher {
    fn publish(&self, event: SyncEvent) -> Result<(), PublishError> {
        let payload = event.to_json()?;
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| PublishError::Poisoned("event emitter"))?;
        emitter.emit(event.event_type(), payload);
        Ok(())
    }
}
