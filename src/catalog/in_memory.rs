//! In-memory catalog for testing and single-process scenarios.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::product::CatalogProduct;
use super::reader::{CatalogError, CatalogReader};

/// Remaining injected failures for one product: `None` fails forever.
type FailureBudget = Option<u32>;

/// In-memory catalog backed by `Arc<RwLock<Vec<CatalogProduct>>>`.
///
/// Clone-friendly (cloning shares the same underlying products), so a test
/// can keep a handle and mutate inventory between passes. Failures can be
/// injected per product to exercise the retry path.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<Vec<CatalogProduct>>>,
    failures: Arc<Mutex<HashMap<String, FailureBudget>>>,
    list_failures: Arc<Mutex<u32>>,
    reads: Arc<Mutex<HashMap<String, u32>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<CatalogProduct>) -> Self {
        Self {
            products: Arc::new(RwLock::new(products)),
            ..Self::default()
        }
    }

    /// Insert or replace a product, keeping catalog order for existing ids.
    pub fn upsert(&self, product: CatalogProduct) {
        let mut products = self.products.write().unwrap_or_else(|e| e.into_inner());
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
    }

    /// Set the inventory of one variant. Returns false if it does not exist.
    pub fn set_inventory(&self, product_id: &str, variant_id: &str, inventory: i64) -> bool {
        let mut products = self.products.write().unwrap_or_else(|e| e.into_inner());
        let variant = products
            .iter_mut()
            .filter(|p| p.id == product_id)
            .flat_map(|p| p.variants.iter_mut())
            .find(|v| v.id == variant_id);
        match variant {
            Some(variant) => {
                variant.inventory = inventory;
                variant.available = inventory > 0;
                true
            }
            None => false,
        }
    }

    /// Make every read of `product_id` fail.
    pub fn fail_product(&self, product_id: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(product_id.into(), None);
    }

    /// Make the next `times` reads of `product_id` fail.
    pub fn fail_product_times(&self, product_id: impl Into<String>, times: u32) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(product_id.into(), Some(times));
    }

    /// Make the next `times` calls to `list_products` fail.
    pub fn fail_listing_times(&self, times: u32) {
        *self.list_failures.lock().unwrap_or_else(|e| e.into_inner()) = times;
    }

    /// Number of `get_product` calls made for `product_id`.
    pub fn reads(&self, product_id: &str) -> u32 {
        self.reads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(product_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_failure(&self, product_id: &str) -> Result<(), CatalogError> {
        let mut failures = self
            .failures
            .lock()
            .map_err(|_| CatalogError::Unavailable("failure table poisoned".into()))?;
        let fail = match failures.get_mut(product_id) {
            None => false,
            Some(None) => true,
            Some(Some(0)) => {
                failures.remove(product_id);
                false
            }
            Some(Some(remaining)) => {
                *remaining -= 1;
                true
            }
        };
        if fail {
            return Err(CatalogError::Unavailable(format!(
                "injected failure for {}",
                product_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn list_products(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        {
            let mut remaining = self
                .list_failures
                .lock()
                .map_err(|_| CatalogError::Unavailable("failure table poisoned".into()))?;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CatalogError::Unavailable("injected listing failure".into()));
            }
        }

        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog poisoned".into()))?;
        Ok(products.clone())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<CatalogProduct>, CatalogError> {
        *self
            .reads
            .lock()
            .map_err(|_| CatalogError::Unavailable("read counter poisoned".into()))?
            .entry(product_id.to_string())
            .or_insert(0) += 1;

        self.take_failure(product_id)?;

        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog poisoned".into()))?;
        Ok(products.iter().find(|p| p.id == product_id).cloned())
    }
}
