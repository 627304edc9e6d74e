//! Shared fixtures for the stock sync suites.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storefront_sync::alert::StockAlert;
use storefront_sync::catalog::{
    CatalogError, CatalogProduct, CatalogReader, CatalogVariant, InMemoryCatalog,
};
use storefront_sync::forward::{ForwardError, SecondaryForwarder};
use storefront_sync::snapshot::{
    InMemorySnapshotStore, ProductSnapshot, SnapshotStore, StockKey, StoreError,
};
use storefront_sync::SyncConfig;
use tokio::sync::{Notify, Semaphore};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with no pauses so passes run at full speed.
pub fn fast_config() -> SyncConfig {
    SyncConfig::default()
        .with_retry_delay(Duration::ZERO)
        .with_batch_delay(Duration::ZERO)
}

/// `count` single-variant products `p0..p{count-1}`, product `pN` holding
/// `N + 1` units.
pub fn numbered_catalog(count: usize) -> InMemoryCatalog {
    InMemoryCatalog::with_products(
        (0..count)
            .map(|i| {
                CatalogProduct::new(format!("p{}", i), format!("Product {}", i))
                    .with_variant(CatalogVariant::new("v1", i as i64 + 1))
            })
            .collect(),
    )
}

/// Catalog whose `get_product` blocks for selected products until opened.
#[derive(Clone)]
pub struct GatedCatalog {
    inner: InMemoryCatalog,
    blocked: Arc<Mutex<HashSet<String>>>,
    gate: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl GatedCatalog {
    pub fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            blocked: Arc::new(Mutex::new(HashSet::new())),
            gate: Arc::new(Semaphore::new(0)),
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn block(&self, product_id: &str) {
        self.blocked.lock().unwrap().insert(product_id.to_string());
    }

    /// Let every blocked read through.
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Wait until some blocked read is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn inner(&self) -> &InMemoryCatalog {
        &self.inner
    }
}

#[async_trait]
impl CatalogReader for GatedCatalog {
    async fn list_products(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        self.inner.list_products().await
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<CatalogProduct>, CatalogError> {
        let blocked = self.blocked.lock().unwrap().contains(product_id);
        if blocked {
            self.entered.notify_one();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| CatalogError::Unavailable("gate closed".into()))?;
        }
        self.inner.get_product(product_id).await
    }
}

/// Forwarder whose secondary store is always down.
#[derive(Clone, Default)]
pub struct DownForwarder {
    calls: Arc<AtomicUsize>,
}

impl DownForwarder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryForwarder for DownForwarder {
    async fn push_stock_level(&self, _key: &StockKey, _level: i64) -> Result<(), ForwardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ForwardError::ConnectionFailed("crm offline".into()))
    }

    async fn push_alert(&self, _alert: &StockAlert) -> Result<(), ForwardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ForwardError::ConnectionFailed("crm offline".into()))
    }
}

/// In-memory store with injected failures.
///
/// Stock writes to a key fail a set number of times; metadata reads of a
/// product always fail.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemorySnapshotStore,
    stock_failures: Arc<Mutex<HashMap<StockKey, u32>>>,
    broken_products: Arc<Mutex<HashSet<String>>>,
    stock_writes: Arc<Mutex<HashMap<StockKey, u32>>>,
}

impl FlakyStore {
    pub fn fail_stock_writes(&self, key: StockKey, times: u32) {
        self.stock_failures.lock().unwrap().insert(key, times);
    }

    pub fn break_product(&self, product_id: &str) {
        self.broken_products
            .lock()
            .unwrap()
            .insert(product_id.to_string());
    }

    /// Write attempts made for `key`, failed ones included.
    pub fn stock_writes(&self, key: &StockKey) -> u32 {
        self.stock_writes
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn inner(&self) -> &InMemorySnapshotStore {
        &self.inner
    }
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn get_stock(&self, key: &StockKey) -> Result<Option<i64>, StoreError> {
        self.inner.get_stock(key).await
    }

    async fn set_stock(&self, key: &StockKey, quantity: i64) -> Result<(), StoreError> {
        *self
            .stock_writes
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(0) += 1;
        let fail = match self.stock_failures.lock().unwrap().get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if fail {
            return Err(StoreError::Backend(format!("write to {} timed out", key)));
        }
        self.inner.set_stock(key, quantity).await
    }

    async fn get_product_snapshot(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductSnapshot>, StoreError> {
        if self.broken_products.lock().unwrap().contains(product_id) {
            return Err(StoreError::Backend(format!("row {} unreadable", product_id)));
        }
        self.inner.get_product_snapshot(product_id).await
    }

    async fn set_product_snapshot(
        &self,
        product_id: &str,
        snapshot: ProductSnapshot,
    ) -> Result<(), StoreError> {
        self.inner.set_product_snapshot(product_id, snapshot).await
    }
}
