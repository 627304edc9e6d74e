//! Core publisher traits for sync notifications.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::{ProductUpdate, StockUpdate};

/// A notification published once per sync pass.
///
/// Serialized as an internally tagged object (`{"type": "stockSyncCompleted", ...}`)
/// so listeners outside the process can switch on the event name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A whole-catalog stock pass finished.
    #[serde(rename_all = "camelCase")]
    StockSyncCompleted {
        updates: Vec<StockUpdate>,
        timestamp: SystemTime,
        error_count: u32,
    },
    /// A metadata pass finished and at least one product changed.
    #[serde(rename_all = "camelCase")]
    ProductsUpdated {
        updates: Vec<ProductUpdate>,
        timestamp: SystemTime,
        error_count: u32,
    },
    /// A metadata pass finished without any change.
    #[serde(rename_all = "camelCase")]
    ProductsRefreshed {
        updates: Vec<ProductUpdate>,
        timestamp: SystemTime,
        error_count: u32,
    },
}

impl SyncEvent {
    pub const STOCK_SYNC_COMPLETED: &'static str = "stockSyncCompleted";
    pub const PRODUCTS_UPDATED: &'static str = "productsUpdated";
    pub const PRODUCTS_REFRESHED: &'static str = "productsRefreshed";

    /// Event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::StockSyncCompleted { .. } => Self::STOCK_SYNC_COMPLETED,
            SyncEvent::ProductsUpdated { .. } => Self::PRODUCTS_UPDATED,
            SyncEvent::ProductsRefreshed { .. } => Self::PRODUCTS_REFRESHED,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            SyncEvent::StockSyncCompleted { timestamp, .. }
            | SyncEvent::ProductsUpdated { timestamp, .. }
            | SyncEvent::ProductsRefreshed { timestamp, .. } => *timestamp,
        }
    }

    pub fn error_count(&self) -> u32 {
        match self {
            SyncEvent::StockSyncCompleted { error_count, .. }
            | SyncEvent::ProductsUpdated { error_count, .. }
            | SyncEvent::ProductsRefreshed { error_count, .. } => *error_count,
        }
    }

    /// Number of updates carried by the event.
    pub fn update_count(&self) -> usize {
        match self {
            SyncEvent::StockSyncCompleted { updates, .. } => updates.len(),
            SyncEvent::ProductsUpdated { updates, .. }
            | SyncEvent::ProductsRefreshed { updates, .. } => updates.len(),
        }
    }

    pub fn to_json(&self) -> Result<String, PublishError> {
        serde_json::to_string(self).map_err(|e| PublishError::SerializationFailed(e.to_string()))
    }
}

/// Error type for publish operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Serialization of the event failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
    /// The bus rejected the event
    #[error("Event rejected: {0}")]
    Rejected(String),
    /// A lock inside the bus was poisoned
    #[error("Bus poisoned: {0}")]
    Poisoned(&'static str),
}

/// Trait for publishing sync notifications.
///
/// Listeners are expected to be idempotent (UI refresh, debug counters).
/// Publish failures are logged by the engine and never fail a pass.
pub trait Publisher: Send + Sync {
    /// Publish a single event.
    fn publish(&self, event: SyncEvent) -> Result<(), PublishError>;
}

/// Publisher that drops everything. Used when nothing listens.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, _event: SyncEvent) -> Result<(), PublishError> {
        Ok(())
    }
}
