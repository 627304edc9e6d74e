//! Notification bus - how sync results reach their consumers.
//!
//! ```text
//! ┌──────────────────────┐   publish(SyncEvent)   ┌──────────────────────┐
//! │   SyncOrchestrator   │ ─────────────────────▶ │      Publisher       │
//! └──────────────────────┘                        └──────────────────────┘
//!                                                   │         │        │
//!                                                   ▼         ▼        ▼
//!                                        InMemoryQueue  BroadcastBus  EmitterPublisher
//!                                        (pull, log)    (tokio push)  (named callbacks)
//! ```
//!
//! One event is published per pass, after the pass has finished; consumers
//! never see a partial pass.

mod broadcast;
#[cfg(feature = "emitter")]
mod emitter;
mod in_memory_queue;
mod publisher;
mod subscriber;

pub use broadcast::{BroadcastBus, DEFAULT_BROADCAST_CAPACITY};
#[cfg(feature = "emitter")]
pub use emitter::EmitterPublisher;
pub use in_memory_queue::InMemoryQueue;
pub use publisher::{NoopPublisher, PublishError, Publisher, SyncEvent};
pub use subscriber::{Subscribable, Subscriber};
