//! The stock and product synchronization state machine.
//!
//! ```text
//!            try_begin (CAS)                 complete / abort / drop
//!   Idle ───────────────────────▶ Running ─────────────────────────────▶ Idle
//!     ▲  guard hit: no-op, Ok([])                 (outcome recorded: Completed,
//!     └──────────────────────────                  PartialFailure or Failed)
//! ```
//!
//! A pass lists the catalog, splits it into batches of `batch_size`, syncs
//! the products of one batch concurrently, pauses `batch_delay`, and moves
//! on to the next batch. One `StockSyncCompleted` event is published when the
//! whole pass is done.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::config::SyncConfig;
use super::retry::RetryPolicy;
use super::state::{PassFlag, RunGuard, SyncPhase, SyncState, SyncStateCell};
use crate::alert::StockAlert;
use crate::bus::{NoopPublisher, Publisher, SyncEvent};
use crate::catalog::{CatalogProduct, CatalogReader};
use crate::diff::{diff_product, diff_stock, ProductUpdate, StockUpdate};
use crate::error::SyncError;
use crate::forward::{NoopForwarder, SecondaryForwarder};
use crate::snapshot::{ProductSnapshot, SnapshotStore, StockKey};

#[derive(Debug, Default)]
struct BatchOutcome {
    updates: Vec<StockUpdate>,
    failures: usize,
}

/// Owns the sync state and drives stock and metadata passes.
///
/// The catalog and the snapshot store are required collaborators. The
/// secondary forwarder and the publisher default to no-ops.
pub struct SyncOrchestrator<C, S> {
    catalog: C,
    store: S,
    forwarder: Arc<dyn SecondaryForwarder>,
    publisher: Arc<dyn Publisher>,
    config: SyncConfig,
    state: SyncStateCell,
    info_pass: PassFlag,
}

impl<C, S> SyncOrchestrator<C, S> {
    pub fn new(catalog: C, store: S, config: SyncConfig) -> Self {
        Self {
            catalog,
            store,
            forwarder: Arc::new(NoopForwarder),
            publisher: Arc::new(NoopPublisher),
            config,
            state: SyncStateCell::new(),
            info_pass: PassFlag::default(),
        }
    }

    /// Mirror confirmed levels and alerts to a secondary store.
    pub fn with_forwarder(mut self, forwarder: impl SecondaryForwarder + 'static) -> Self {
        self.forwarder = Arc::new(forwarder);
        self
    }

    /// Publish pass results to the given bus.
    pub fn with_publisher(mut self, publisher: impl Publisher + 'static) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consistent copy of the run state.
    pub fn state(&self) -> SyncState {
        self.state.snapshot()
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.phase()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retry_attempts, self.config.retry_delay)
    }

    fn publish(&self, event: SyncEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.publisher.publish(event) {
            warn!(event_type, error = %err, "Failed to publish sync event");
        }
    }

    async fn forward_alert(&self, alert: &StockAlert) {
        if let Err(err) = self.forwarder.push_alert(alert).await {
            warn!(
                product_id = %alert.product_id,
                variant_id = %alert.variant_id,
                alert_type = %alert.alert_type,
                error = %err,
                "Failed to forward stock alert"
            );
        }
    }

    async fn forward_level(&self, key: &StockKey, level: i64) {
        if let Err(err) = self.forwarder.push_stock_level(key, level).await {
            warn!(%key, level, error = %err, "Failed to forward stock level");
        }
    }
}

impl<C: CatalogReader, S: SnapshotStore> SyncOrchestrator<C, S> {
    /// Sync the stock of one product, outside of any pass.
    ///
    /// Retries the whole product up to `retry_attempts` times. On success the
    /// error counter is cleared; when retries run out it is incremented and
    /// the error returned.
    pub async fn sync_product_stock(&self, product_id: &str) -> Result<Vec<StockUpdate>, SyncError> {
        let result = match self
            .sync_product_with_retry(product_id, &CancellationToken::new())
            .await
        {
            Ok(updates) => self.store.flush().await.map(|()| updates).map_err(SyncError::from),
            Err(err) => Err(err),
        };
        match result {
            Ok(updates) => {
                self.state.clear_errors();
                Ok(updates)
            }
            Err(err) => {
                self.state.record_failure(&err.to_string());
                Err(err)
            }
        }
    }

    /// Manual trigger: run a stock pass now and return its updates.
    ///
    /// Returns an empty list when a pass is already running.
    pub async fn trigger_manual_sync(&self) -> Result<Vec<StockUpdate>, SyncError> {
        info!("Manual stock sync requested");
        self.sync_all_products_stock().await
    }

    /// Run a whole-catalog stock pass.
    pub async fn sync_all_products_stock(&self) -> Result<Vec<StockUpdate>, SyncError> {
        self.sync_all_products_stock_with_cancel(&CancellationToken::new())
            .await
    }

    /// Run a whole-catalog stock pass that stops scheduling batches once
    /// `cancel` fires.
    ///
    /// A call made while another pass is running returns `Ok(vec![])` at once
    /// and changes nothing. A cancelled pass keeps what it already applied,
    /// does not stamp `last_sync`, publishes nothing, and returns
    /// `SyncError::Cancelled`.
    pub async fn sync_all_products_stock_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<StockUpdate>, SyncError> {
        let Some(guard) = self.state.try_begin() else {
            debug!("Stock sync already running, skipping");
            return Ok(Vec::new());
        };
        let started = Instant::now();

        let products = match self
            .retry_policy()
            .run(cancel, |_| self.catalog.list_products())
            .await
        {
            Ok(products) => products,
            Err(exhausted) => {
                let err = SyncError::Catalog(exhausted.last_error);
                error!(attempts = exhausted.attempts, error = %err, "Could not list catalog");
                self.state.record_failure(&err.to_string());
                guard.abort(&err.to_string());
                return Err(err);
            }
        };

        let batch_size = self.config.batch_size.max(1);
        let ids: Vec<String> = products.into_iter().map(|p| p.id).collect();
        guard.set_total_products(ids.len());
        info!(
            total_products = ids.len(),
            batches = ids.len().div_ceil(batch_size),
            batch_size,
            "Starting stock sync pass"
        );

        let mut updates = Vec::new();
        let mut failures = 0;

        for (index, batch) in ids.chunks(batch_size).enumerate() {
            if index > 0 && !self.pause_between_batches(cancel).await {
                return Err(self.cancel_pass(guard, updates.len()));
            }
            if cancel.is_cancelled() {
                return Err(self.cancel_pass(guard, updates.len()));
            }

            guard.begin_batch(index + 1);
            debug!(batch = index + 1, products = batch.len(), "Syncing batch");

            let mut outcome = self.run_batch(batch, cancel).await;
            if let Err(err) = self.store.flush().await {
                error!(batch = index + 1, error = %err, "Failed to flush snapshot store");
                self.state.record_failure(&err.to_string());
                outcome.failures += 1;
            }
            failures += outcome.failures;
            updates.extend(outcome.updates);
        }

        let now = SystemTime::now();
        let error_count = guard.complete(now, failures);
        info!(
            updates = updates.len(),
            failures,
            error_count,
            took_ms = started.elapsed().as_millis() as u64,
            "Stock sync pass finished"
        );

        self.publish(SyncEvent::StockSyncCompleted {
            updates: updates.clone(),
            timestamp: now,
            error_count,
        });
        Ok(updates)
    }

    /// Run a metadata pass: diff title, description, price, images and
    /// availability of every product against its stored snapshot, and
    /// overwrite the snapshot with the fresh values.
    ///
    /// Products whose snapshot cannot be read or written are logged and
    /// skipped. Returns an empty list if a metadata pass is already running.
    pub async fn sync_products_info(&self) -> Result<Vec<ProductUpdate>, SyncError> {
        let Some(_pass) = self.info_pass.try_acquire() else {
            debug!("Product info sync already running, skipping");
            return Ok(Vec::new());
        };

        let products = self
            .retry_policy()
            .run(&CancellationToken::new(), |_| self.catalog.list_products())
            .await
            .map_err(|exhausted| SyncError::Catalog(exhausted.last_error))?;

        let now = SystemTime::now();
        let mut updates = Vec::new();
        let mut failures: u32 = 0;

        for product in &products {
            match self.refresh_product_info(product, now).await {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(err) => {
                    warn!(product_id = %product.id, error = %err, "Failed to refresh product info");
                    failures += 1;
                }
            }
        }

        if let Err(err) = self.store.flush().await {
            warn!(error = %err, "Failed to flush product snapshots");
            failures += 1;
        }

        info!(
            products = products.len(),
            changed = updates.len(),
            failures,
            "Product info sync finished"
        );

        let event = if updates.is_empty() {
            SyncEvent::ProductsRefreshed {
                updates: Vec::new(),
                timestamp: now,
                error_count: failures,
            }
        } else {
            SyncEvent::ProductsUpdated {
                updates: updates.clone(),
                timestamp: now,
                error_count: failures,
            }
        };
        self.publish(event);
        Ok(updates)
    }

    async fn refresh_product_info(
        &self,
        product: &CatalogProduct,
        now: SystemTime,
    ) -> Result<Option<ProductUpdate>, SyncError> {
        let previous = self.store.get_product_snapshot(&product.id).await?;
        let current = ProductSnapshot::from(product);
        self.store
            .set_product_snapshot(&product.id, current.clone())
            .await?;
        Ok(diff_product(&product.id, previous, current, now))
    }

    /// Returns false if cancelled during the pause.
    async fn pause_between_batches(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.batch_delay) => true,
        }
    }

    fn cancel_pass(&self, guard: RunGuard<'_>, applied: usize) -> SyncError {
        let err = SyncError::Cancelled { applied };
        warn!(applied, "Stock sync pass cancelled");
        guard.abort(&err.to_string());
        err
    }

    async fn run_batch(&self, batch: &[String], cancel: &CancellationToken) -> BatchOutcome {
        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .map(|product_id| async move {
                let result = self.sync_product_with_retry(product_id, cancel).await;
                (product_id.as_str(), result)
            })
            .collect();

        let deadline = self
            .config
            .batch_timeout
            .map(|limit| tokio::time::Instant::now() + limit);
        let mut finished = HashSet::with_capacity(batch.len());
        let mut outcome = BatchOutcome::default();

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        for product_id in batch.iter().filter(|id| !finished.contains(id.as_str())) {
                            warn!(%product_id, "Batch timed out before product finished");
                            self.state.record_failure(&format!("sync of {} timed out", product_id));
                            outcome.failures += 1;
                        }
                        break;
                    }
                },
                None => pending.next().await,
            };

            let Some((product_id, result)) = next else {
                break;
            };
            finished.insert(product_id);

            match result {
                Ok(updates) => outcome.updates.extend(updates),
                Err(err) => {
                    error!(%product_id, error = %err, "Product stock sync failed");
                    self.state.record_failure(&err.to_string());
                    outcome.failures += 1;
                }
            }
        }

        outcome
    }

    /// Sync one product with bounded retries.
    ///
    /// Updates applied by an attempt that later failed are kept and returned
    /// with the successful attempt, since the store already holds them and
    /// the next attempt will not see them as drift again.
    async fn sync_product_with_retry(
        &self,
        product_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StockUpdate>, SyncError> {
        let policy = self.retry_policy();
        let applied = Mutex::new(Vec::new());

        let result = policy
            .run(cancel, |attempt| {
                let applied = &applied;
                async move {
                    let result = self.sync_product_once(product_id, applied).await;
                    if let Err(err) = &result {
                        warn!(
                            %product_id,
                            attempt,
                            max_attempts = policy.max_attempts(),
                            error = %err,
                            "Product stock sync attempt failed"
                        );
                    }
                    result
                }
            })
            .await;

        match result {
            Ok(()) => Ok(applied.into_inner().unwrap_or_else(|e| e.into_inner())),
            Err(exhausted) => Err(SyncError::RetriesExhausted {
                product_id: product_id.to_string(),
                attempts: exhausted.attempts,
                source: Box::new(exhausted.last_error),
            }),
        }
    }

    #[instrument(level = "debug", skip(self, applied))]
    async fn sync_product_once(
        &self,
        product_id: &str,
        applied: &Mutex<Vec<StockUpdate>>,
    ) -> Result<(), SyncError> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| SyncError::ProductNotFound(product_id.to_string()))?;

        let mut stored = HashMap::with_capacity(product.variants.len());
        for variant in &product.variants {
            let key = StockKey::new(&product.id, &variant.id);
            if let Some(level) = self.store.get_stock(&key).await? {
                stored.insert(variant.id.clone(), level);
            }
        }

        let updates = diff_stock(&product, &stored, &self.config.source, SystemTime::now());
        for update in updates {
            let key = update.key();
            self.store.set_stock(&key, update.new_level).await?;

            for alert in self.config.thresholds.evaluate(&update) {
                debug!(%key, alert_type = %alert.alert_type, "Stock alert raised");
                self.forward_alert(&alert).await;
            }
            self.forward_level(&key, update.new_level).await;

            debug!(
                %key,
                previous = update.previous_level,
                new = update.new_level,
                "Stock level updated"
            );
            applied
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(update);
        }
        Ok(())
    }
}
