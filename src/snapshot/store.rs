use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogProduct;

/// Error type for snapshot persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("snapshot store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Failure reported by a remote backend.
    #[error("snapshot backend error: {0}")]
    Backend(String),
}

/// Key of one stock record: a variant of a product.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: String,
    pub variant_id: String,
}

impl StockKey {
    pub fn new(product_id: impl Into<String>, variant_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
        }
    }
}

/// Renders `product:variant` for logs. Not a storage key: ids may contain `:`.
impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.product_id, self.variant_id)
    }
}

/// Cached copy of the mutable metadata of a catalog product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub title: String,
    pub description: String,
    pub price_cents: Option<u64>,
    pub image_urls: Vec<String>,
    pub available: bool,
}

impl From<&CatalogProduct> for ProductSnapshot {
    fn from(product: &CatalogProduct) -> Self {
        Self {
            title: product.title.clone(),
            description: product.description.clone(),
            price_cents: product.min_price_cents(),
            image_urls: product.image_urls.clone(),
            available: product.is_available(),
        }
    }
}

/// Trait for the engine's last-known catalog state.
///
/// One stock level per `StockKey` and one metadata snapshot per product id
/// (latest wins). Writing the value already stored is a no-op. There is no
/// multi-key transaction: every key is updated on its own.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the stored stock level for a variant.
    async fn get_stock(&self, key: &StockKey) -> Result<Option<i64>, StoreError>;

    /// Save (or overwrite) the stock level for a variant.
    async fn set_stock(&self, key: &StockKey, quantity: i64) -> Result<(), StoreError>;

    /// Load the stored metadata snapshot for a product.
    async fn get_product_snapshot(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductSnapshot>, StoreError>;

    /// Save (or overwrite) the metadata snapshot for a product.
    async fn set_product_snapshot(
        &self,
        product_id: &str,
        snapshot: ProductSnapshot,
    ) -> Result<(), StoreError>;

    /// Make buffered writes durable. Stores that persist every write have
    /// nothing to do.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
