#[path = "../support/mod.rs"]
mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use storefront_sync::bus::BroadcastBus;
use storefront_sync::catalog::{CatalogProduct, CatalogVariant, InMemoryCatalog};
use storefront_sync::snapshot::{FileSnapshotStore, SnapshotStore, WriteMode};
use storefront_sync::sync::PassOutcome;
use storefront_sync::{
    InMemoryQueue, InMemorySnapshotStore, LogForwarder, StockKey, SyncError, SyncEvent,
    SyncOrchestrator,
};
use support::{
    fast_config, init_tracing, numbered_catalog, DownForwarder, FlakyStore, GatedCatalog,
};
use tokio_util::sync::CancellationToken;

fn completed_updates(queue: &InMemoryQueue) -> Vec<storefront_sync::StockUpdate> {
    match queue.last_of_type(SyncEvent::STOCK_SYNC_COMPLETED) {
        Some(SyncEvent::StockSyncCompleted { updates, .. }) => updates,
        other => panic!("expected stockSyncCompleted, got {:?}", other),
    }
}

#[tokio::test]
async fn first_pass_uses_zero_baseline() {
    init_tracing();
    let catalog = InMemoryCatalog::with_products(vec![CatalogProduct::new("p1", "Mug")
        .with_variant(CatalogVariant::new("small", 4))
        .with_variant(CatalogVariant::new("sold-out", 0))]);
    let orchestrator = SyncOrchestrator::new(catalog, InMemorySnapshotStore::new(), fast_config());

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|u| u.previous_level == 0));
    assert_eq!(updates[0].new_level, 4);
    assert_eq!(updates[0].source, "catalog-sync");
    assert_eq!(
        orchestrator
            .store()
            .get_stock(&StockKey::new("p1", "sold-out"))
            .await
            .unwrap(),
        Some(0)
    );
}

#[tokio::test]
async fn unchanged_catalog_yields_no_updates() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let catalog = numbered_catalog(3);
    let orchestrator = SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config())
        .with_publisher(queue.clone());

    assert_eq!(orchestrator.sync_all_products_stock().await.unwrap().len(), 3);
    assert!(orchestrator.sync_all_products_stock().await.unwrap().is_empty());

    catalog.set_inventory("p1", "v1", 40);
    let updates = orchestrator.sync_all_products_stock().await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].previous_level, 2);
    assert_eq!(updates[0].new_level, 40);
    assert_eq!(updates[0].delta(), 38);

    let counts: Vec<usize> = queue
        .find_all_by_type(SyncEvent::STOCK_SYNC_COMPLETED)
        .iter()
        .map(SyncEvent::update_count)
        .collect();
    assert_eq!(counts, vec![3, 0, 1]);
}

#[tokio::test]
async fn twenty_five_products_run_in_three_batches() {
    init_tracing();
    let orchestrator = SyncOrchestrator::new(
        numbered_catalog(25),
        InMemorySnapshotStore::new(),
        fast_config().with_batch_size(10),
    );

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    let state = orchestrator.state();
    assert_eq!(updates.len(), 25);
    assert_eq!(state.current_batch, 3);
    assert_eq!(state.total_products, 25);
    assert!(state.last_sync.is_some());
    assert!(!state.is_running);
    assert_eq!(state.last_outcome, Some(PassOutcome::Completed));
    assert_eq!(orchestrator.store().stock_len(), 25);
}

#[tokio::test]
async fn failing_product_does_not_block_siblings() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let catalog = numbered_catalog(25);
    catalog.fail_product("p7");
    let orchestrator = SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config())
        .with_publisher(queue.clone());

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 24);
    assert!(updates.iter().all(|u| u.product_id != "p7"));
    assert_eq!(catalog.reads("p7"), 3);

    let state = orchestrator.state();
    assert_eq!(state.error_count, 1);
    assert_eq!(state.last_outcome, Some(PassOutcome::PartialFailure));
    assert!(state.last_sync.is_some());
    assert!(state.last_error.unwrap().contains("p7"));

    let event = queue.last_of_type(SyncEvent::STOCK_SYNC_COMPLETED).unwrap();
    assert_eq!(event.error_count(), 1);
    assert_eq!(completed_updates(&queue).len(), 24);
}

#[tokio::test]
async fn clean_pass_resets_error_count() {
    init_tracing();
    let catalog = numbered_catalog(4);
    catalog.fail_product_times("p2", 3);
    let orchestrator = SyncOrchestrator::new(catalog, InMemorySnapshotStore::new(), fast_config());

    orchestrator.sync_all_products_stock().await.unwrap();
    assert_eq!(orchestrator.state().error_count, 1);

    let updates = orchestrator.sync_all_products_stock().await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].product_id, "p2");
    assert_eq!(orchestrator.state().error_count, 0);
}

#[tokio::test]
async fn transient_failure_is_retried_within_the_pass() {
    init_tracing();
    let catalog = numbered_catalog(2);
    catalog.fail_product_times("p1", 2);
    let orchestrator = SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config());

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(catalog.reads("p1"), 3);
    assert_eq!(orchestrator.state().error_count, 0);
}

#[tokio::test]
async fn concurrent_pass_is_a_no_op() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let catalog = GatedCatalog::new(numbered_catalog(3));
    catalog.block("p0");
    let orchestrator = Arc::new(
        SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config())
            .with_publisher(queue.clone()),
    );

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.sync_all_products_stock().await }
    });
    catalog.wait_entered().await;

    let before = orchestrator.state();
    assert!(before.is_running);
    let second = orchestrator.sync_all_products_stock().await.unwrap();
    assert!(second.is_empty());
    assert_eq!(orchestrator.state(), before);
    assert!(queue.is_empty());

    catalog.open();
    let updates = first.await.unwrap().unwrap();
    assert_eq!(updates.len(), 3);
    assert_eq!(queue.len(), 1);
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn batch_timeout_counts_unfinished_products_as_failed() {
    init_tracing();
    let catalog = GatedCatalog::new(numbered_catalog(4));
    catalog.block("p3");
    let orchestrator = SyncOrchestrator::new(
        catalog,
        InMemorySnapshotStore::new(),
        fast_config().with_batch_timeout(Duration::from_millis(100)),
    );

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 3);
    let state = orchestrator.state();
    assert_eq!(state.error_count, 1);
    assert_eq!(state.last_outcome, Some(PassOutcome::PartialFailure));
    assert_eq!(
        orchestrator
            .store()
            .get_stock(&StockKey::new("p3", "v1"))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn cancelled_pass_keeps_applied_batches_and_publishes_nothing() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            numbered_catalog(6),
            InMemorySnapshotStore::new(),
            fast_config()
                .with_batch_size(2)
                .with_batch_delay(Duration::from_secs(3600)),
        )
        .with_publisher(queue.clone()),
    );
    let cancel = CancellationToken::new();

    let pass = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.sync_all_products_stock_with_cancel(&cancel).await }
    });

    for _ in 0..200 {
        if orchestrator.store().stock_len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), pass)
        .await
        .expect("cancelled pass should return promptly")
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled { applied: 2 }));
    let state = orchestrator.state();
    assert!(!state.is_running);
    assert!(state.last_sync.is_none());
    assert_eq!(state.current_batch, 1);
    assert_eq!(state.last_outcome, Some(PassOutcome::Failed));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn listing_failure_aborts_without_publishing() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let catalog = numbered_catalog(2);
    catalog.fail_listing_times(5);
    let orchestrator = SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config())
        .with_publisher(queue.clone());

    let err = orchestrator.sync_all_products_stock().await.unwrap_err();
    assert!(matches!(err, SyncError::Catalog(_)));

    let state = orchestrator.state();
    assert!(!state.is_running);
    assert!(state.last_sync.is_none());
    assert_eq!(state.error_count, 1);
    assert!(queue.is_empty());

    // two failures left, within the retry budget
    let updates = orchestrator.sync_all_products_stock().await.unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(orchestrator.state().error_count, 0);
}

#[tokio::test]
async fn restock_alert_is_edge_triggered_across_passes() {
    init_tracing();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let catalog = InMemoryCatalog::with_products(vec![
        CatalogProduct::new("p1", "Mug").with_variant(CatalogVariant::new("v1", 3))
    ]);
    let orchestrator = SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config())
        .with_forwarder(LogForwarder::with_buffer(lines.clone()));

    for level in [3, 12, 15, 20] {
        catalog.set_inventory("p1", "v1", level);
        orchestrator.sync_all_products_stock().await.unwrap();
    }

    let lines = lines.lock().unwrap().clone();
    let alerts: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|l| l.starts_with("[ALERT]"))
        .collect();
    assert_eq!(
        alerts,
        vec![
            "[ALERT] low_stock p1:v1 stock=3 threshold=5",
            "[ALERT] restocked p1:v1 stock=12 threshold=10",
        ]
    );
    let levels = lines.iter().filter(|l| l.starts_with("[STOCK]")).count();
    assert_eq!(levels, 4);
}

#[tokio::test]
async fn file_store_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let catalog = numbered_catalog(3);

    let store = FileSnapshotStore::open(&path).await.unwrap();
    let orchestrator = SyncOrchestrator::new(catalog.clone(), store, fast_config());
    assert_eq!(orchestrator.sync_all_products_stock().await.unwrap().len(), 3);
    drop(orchestrator);

    let store = FileSnapshotStore::open(&path).await.unwrap();
    let orchestrator = SyncOrchestrator::new(catalog, store, fast_config());
    assert!(orchestrator.sync_all_products_stock().await.unwrap().is_empty());
}

#[tokio::test]
async fn broadcast_subscribers_see_the_pass() {
    init_tracing();
    let bus = BroadcastBus::default();
    let mut rx = bus.subscribe();
    let orchestrator = SyncOrchestrator::new(numbered_catalog(2), InMemorySnapshotStore::new(), fast_config())
        .with_publisher(bus);

    orchestrator.sync_all_products_stock().await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type(), "stockSyncCompleted");
    assert_eq!(event.update_count(), 2);

    let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
    assert_eq!(json["type"], "stockSyncCompleted");
    assert_eq!(json["errorCount"], 0);
    assert_eq!(json["updates"].as_array().unwrap().len(), 2);
    assert_eq!(json["updates"][0]["previousLevel"], 0);
}

#[tokio::test]
async fn manual_trigger_runs_a_stock_pass() {
    init_tracing();
    let orchestrator = SyncOrchestrator::new(numbered_catalog(2), InMemorySnapshotStore::new(), fast_config());

    let updates = orchestrator.trigger_manual_sync().await.unwrap();

    assert_eq!(updates.len(), 2);
    assert!(orchestrator.state().last_sync.is_some());
}

#[tokio::test]
async fn metadata_pass_reports_changed_fields() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let catalog = InMemoryCatalog::with_products(vec![CatalogProduct::new("p1", "Mug")
        .with_description("Stoneware")
        .with_variant(CatalogVariant::new("v1", 3).with_price_cents(1500))]);
    let orchestrator = SyncOrchestrator::new(catalog.clone(), InMemorySnapshotStore::new(), fast_config())
        .with_publisher(queue.clone());

    orchestrator.sync_products_info().await.unwrap();

    catalog.upsert(
        CatalogProduct::new("p1", "Mug")
            .with_description("Stoneware")
            .with_image("https://cdn.example.com/mug.png")
            .with_variant(CatalogVariant::new("v1", 3).with_price_cents(1200)),
    );
    let updates = orchestrator.sync_products_info().await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].changed,
        vec![
            storefront_sync::ProductField::Price,
            storefront_sync::ProductField::Images
        ]
    );
    assert_eq!(updates[0].previous.as_ref().unwrap().price_cents, Some(1500));
    assert_eq!(queue.event_types(), vec!["productsUpdated", "productsUpdated"]);
}

#[tokio::test]
async fn forwarder_outage_does_not_fail_the_pass() {
    init_tracing();
    let forwarder = DownForwarder::default();
    let orchestrator = SyncOrchestrator::new(numbered_catalog(12), InMemorySnapshotStore::new(), fast_config())
        .with_forwarder(forwarder.clone());

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 12);
    assert_eq!(orchestrator.store().stock_len(), 12);
    assert_eq!(
        orchestrator
            .store()
            .get_stock(&StockKey::new("p11", "v1"))
            .await
            .unwrap(),
        Some(12)
    );
    // every level plus the low-stock and restock alerts reached the forwarder
    assert!(forwarder.calls() > 12);

    let state = orchestrator.state();
    assert_eq!(state.error_count, 0);
    assert_eq!(state.last_outcome, Some(PassOutcome::Completed));
}

#[tokio::test]
async fn transient_store_failure_is_retried() {
    init_tracing();
    let store = FlakyStore::default();
    let key = StockKey::new("p1", "v1");
    store.fail_stock_writes(key.clone(), 2);
    let catalog = numbered_catalog(3);
    let orchestrator = SyncOrchestrator::new(catalog.clone(), store.clone(), fast_config());

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 3);
    assert_eq!(store.stock_writes(&key), 3);
    assert_eq!(catalog.reads("p1"), 3);
    assert_eq!(store.inner().get_stock(&key).await.unwrap(), Some(2));
    assert_eq!(orchestrator.state().error_count, 0);
}

#[tokio::test]
async fn persistent_store_failure_is_contained() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let store = FlakyStore::default();
    let key = StockKey::new("p1", "v1");
    store.fail_stock_writes(key.clone(), u32::MAX);
    let orchestrator = SyncOrchestrator::new(numbered_catalog(3), store.clone(), fast_config())
        .with_publisher(queue.clone());

    let updates = orchestrator.sync_all_products_stock().await.unwrap();

    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|u| u.product_id != "p1"));
    assert_eq!(store.stock_writes(&key), 3);
    assert_eq!(store.inner().get_stock(&key).await.unwrap(), None);
    assert_eq!(orchestrator.state().error_count, 1);
    assert_eq!(
        queue
            .last_of_type(SyncEvent::STOCK_SYNC_COMPLETED)
            .unwrap()
            .error_count(),
        1
    );
}

#[tokio::test]
async fn unreadable_product_snapshot_is_skipped() {
    init_tracing();
    let queue = InMemoryQueue::new();
    let store = FlakyStore::default();
    store.break_product("p1");
    let orchestrator = SyncOrchestrator::new(numbered_catalog(3), store.clone(), fast_config())
        .with_publisher(queue.clone());

    let updates = orchestrator.sync_products_info().await.unwrap();

    let ids: Vec<&str> = updates.iter().map(|u| u.product_id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p2"]);
    assert!(store.inner().get_product_snapshot("p1").await.unwrap().is_none());

    let event = queue.last_of_type(SyncEvent::PRODUCTS_UPDATED).unwrap();
    assert_eq!(event.update_count(), 2);
    assert_eq!(event.error_count(), 1);
}

#[tokio::test]
async fn deferred_file_store_is_flushed_per_batch() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let catalog = InMemoryCatalog::with_products(vec![CatalogProduct::new("gid://shop/Product/1", "Mug")
        .with_variant(CatalogVariant::new("gid://shop/Variant/1", 4))
        .with_variant(CatalogVariant::new("gid://shop/Variant/2", 9))]);

    let store = FileSnapshotStore::open_with_mode(&path, WriteMode::Deferred)
        .await
        .unwrap();
    let orchestrator = SyncOrchestrator::new(catalog.clone(), store, fast_config());
    assert_eq!(orchestrator.sync_all_products_stock().await.unwrap().len(), 2);

    let reopened = FileSnapshotStore::open(&path).await.unwrap();
    assert_eq!(
        reopened
            .get_stock(&StockKey::new("gid://shop/Product/1", "gid://shop/Variant/2"))
            .await
            .unwrap(),
        Some(9)
    );
    let orchestrator = SyncOrchestrator::new(catalog, reopened, fast_config());
    assert!(orchestrator.sync_all_products_stock().await.unwrap().is_empty());
}
