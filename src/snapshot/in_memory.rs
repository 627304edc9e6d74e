use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::store::{ProductSnapshot, SnapshotStore, StockKey, StoreError};

/// In-memory snapshot store backed by `Arc<RwLock<HashMap>>`.
///
/// Clone-friendly (cloning shares the same underlying storage).
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    stock: Arc<RwLock<HashMap<StockKey, i64>>>,
    products: Arc<RwLock<HashMap<String, ProductSnapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stock records held.
    pub fn stock_len(&self) -> usize {
        self.stock.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Number of product snapshots held.
    pub fn product_len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get_stock(&self, key: &StockKey) -> Result<Option<i64>, StoreError> {
        let stock = self
            .stock
            .read()
            .map_err(|_| StoreError::LockPoisoned("stock read"))?;
        Ok(stock.get(key).copied())
    }

    async fn set_stock(&self, key: &StockKey, quantity: i64) -> Result<(), StoreError> {
        let mut stock = self
            .stock
            .write()
            .map_err(|_| StoreError::LockPoisoned("stock write"))?;
        stock.insert(key.clone(), quantity);
        Ok(())
    }

    async fn get_product_snapshot(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductSnapshot>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("snapshot read"))?;
        Ok(products.get(product_id).cloned())
    }

    async fn set_product_snapshot(
        &self,
        product_id: &str,
        snapshot: ProductSnapshot,
    ) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::LockPoisoned("snapshot write"))?;
        products.insert(product_id.to_string(), snapshot);
        Ok(())
    }
}
