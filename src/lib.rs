//! Keeps a storefront's stock levels and product metadata in step with a
//! remote catalog.
//!
//! A [`SyncOrchestrator`] reads the catalog, diffs it against the local
//! [`snapshot`](crate::snapshot) store, persists the drift, raises stock
//! alerts, mirrors confirmed levels to a secondary store, and publishes one
//! [`SyncEvent`] per pass. A [`SyncScheduler`] drives passes periodically.

pub mod alert;
pub mod bus;
pub mod catalog;
pub mod diff;
mod error;
pub mod forward;
pub mod snapshot;
pub mod sync;

pub use alert::{AlertThresholds, AlertType, StockAlert};
pub use bus::{InMemoryQueue, Publisher, SyncEvent};
pub use catalog::{CatalogProduct, CatalogReader, CatalogVariant, InMemoryCatalog};
pub use diff::{ProductField, ProductUpdate, StockUpdate};
pub use error::{ConfigError, SyncError};
pub use forward::{LogForwarder, SecondaryForwarder};
pub use snapshot::{InMemorySnapshotStore, ProductSnapshot, SnapshotStore, StockKey};
pub use sync::{
    SchedulerHandle, SchedulerStats, SyncConfig, SyncOrchestrator, SyncPhase, SyncScheduler,
    SyncState,
};
