use thiserror::Error;

use crate::catalog::CatalogError;
use crate::snapshot::StoreError;

/// Error type for synchronization passes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading the remote catalog failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    /// Reading or writing the local snapshot failed.
    #[error("snapshot store error: {0}")]
    Store(#[from] StoreError),
    /// The catalog no longer lists the product.
    #[error("product not found in catalog: {0}")]
    ProductNotFound(String),
    /// Every attempt for a product failed.
    #[error("sync of {product_id} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        product_id: String,
        attempts: u32,
        #[source]
        source: Box<SyncError>,
    },
    /// The pass was cancelled before all batches were scheduled.
    #[error("sync pass cancelled after {applied} updates")]
    Cancelled { applied: usize },
}

impl SyncError {
    /// Product the error is attributed to, if any.
    pub fn product_id(&self) -> Option<&str> {
        match self {
            SyncError::ProductNotFound(id) => Some(id),
            SyncError::RetriesExhausted { product_id, .. } => Some(product_id),
            _ => None,
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
