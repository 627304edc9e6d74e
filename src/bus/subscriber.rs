//! Core subscriber traits for sync notifications.

use super::publisher::{PublishError, SyncEvent};

/// Trait for pulling sync notifications.
///
/// This is a pull-based interface. `BroadcastBus` offers a push-based
/// alternative through tokio receivers.
pub trait Subscriber: Send + Sync {
    /// Return the next unread event, or `None` if caught up. Never blocks.
    fn poll(&self) -> Result<Option<SyncEvent>, PublishError>;
}

/// Trait for subscribers that can create independent subscriber instances.
pub trait Subscribable: Subscriber + Sized {
    /// Create a new independent subscriber sharing the same event source.
    ///
    /// The new subscriber has its own read position, allowing multiple
    /// independent consumers of the same event stream.
    fn new_subscriber(&self) -> Self;
}
