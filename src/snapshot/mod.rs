//! Snapshot - the engine's last-known view of the catalog.
//!
//! Stock levels are keyed by `(product_id, variant_id)` and metadata
//! snapshots by product id. The store is owned by the sync engine; nothing
//! else writes to it.

mod file;
mod in_memory;
mod serialized;
mod store;

pub use file::{FileSnapshotStore, WriteMode};
pub use in_memory::InMemorySnapshotStore;
pub use serialized::SerializedSnapshotStore;
pub use store::{ProductSnapshot, SnapshotStore, StockKey, StoreError};
