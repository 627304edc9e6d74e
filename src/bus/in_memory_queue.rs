//! In-memory queue for testing and single-process scenarios.
//!
//! This module provides a thread-safe in-memory queue that implements
//! both `Publisher` and `Subscriber`, useful for:
//! - Unit and integration testing without external dependencies
//! - Debug panels that replay every notification of a session

use std::sync::{Arc, Mutex, RwLock};

use super::{PublishError, Publisher, Subscribable, Subscriber, SyncEvent};

/// In-memory queue of sync notifications.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Supports multiple subscribers via `new_subscriber()`
/// - Events are stored in an append-only log
/// - Each subscriber tracks its own read position
///
/// ## Example
///
/// ```
/// use std::time::SystemTime;
/// use storefront_sync::bus::{InMemoryQueue, Publisher, Subscriber, SyncEvent};
///
/// let queue = InMemoryQueue::new();
/// queue
///     .publish(SyncEvent::StockSyncCompleted {
///         updates: vec![],
///         timestamp: SystemTime::now(),
///         error_count: 0,
///     })
///     .unwrap();
///
/// let event = queue.poll().unwrap().unwrap();
/// assert_eq!(event.event_type(), "stockSyncCompleted");
/// ```
#[derive(Clone)]
pub struct InMemoryQueue {
    /// Shared event log
    log: Arc<RwLock<Vec<SyncEvent>>>,
    /// Per-subscriber read position
    position: Arc<Mutex<usize>>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    /// Create a new in-memory queue.
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            position: Arc::new(Mutex::new(0)),
        }
    }

    /// Get all events in the log.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    /// Get all event types in order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.log
            .read()
            .map(|log| log.iter().map(SyncEvent::event_type).collect())
            .unwrap_or_default()
    }

    /// Get the total number of events in the log.
    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent event of the given type.
    pub fn last_of_type(&self, event_type: &str) -> Option<SyncEvent> {
        self.log
            .read()
            .ok()?
            .iter()
            .rev()
            .find(|e| e.event_type() == event_type)
            .cloned()
    }

    /// Find all events matching a type.
    pub fn find_all_by_type(&self, event_type: &str) -> Vec<SyncEvent> {
        self.log
            .read()
            .map(|log| {
                log.iter()
                    .filter(|e| e.event_type() == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the current subscriber position.
    pub fn current_position(&self) -> usize {
        self.position.lock().map(|p| *p).unwrap_or(0)
    }

    /// Clear all events from the log (useful for test cleanup).
    pub fn clear(&self) {
        if let Ok(mut log) = self.log.write() {
            log.clear();
        }
        if let Ok(mut position) = self.position.lock() {
            *position = 0;
        }
    }
}

impl Publisher for InMemoryQueue {
    fn publish(&self, event: SyncEvent) -> Result<(), PublishError> {
        self.log
            .write()
            .map_err(|_| PublishError::Poisoned("queue log"))?
            .push(event);
        Ok(())
    }
}

impl Subscriber for InMemoryQueue {
    fn poll(&self) -> Result<Option<SyncEvent>, PublishError> {
        let log = self
            .log
            .read()
            .map_err(|_| PublishError::Poisoned("queue log"))?;
        let mut pos = self
            .position
            .lock()
            .map_err(|_| PublishError::Poisoned("queue position"))?;

        match log.get(*pos) {
            Some(event) => {
                *pos += 1;
                Ok(Some(event.clone()))
            }
            None => Ok(None),
        }
    }
}

impl Subscribable for InMemoryQueue {
    fn new_subscriber(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
            position: Arc::new(Mutex::new(0)),
        }
    }
}
