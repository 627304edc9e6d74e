//! Periodic driver for the sync engine.
//!
//! A tokio task that runs a stock pass followed by a metadata pass every
//! `sync_interval`, and on demand when triggered through the handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::orchestrator::SyncOrchestrator;
use crate::catalog::CatalogReader;
use crate::error::SyncError;
use crate::snapshot::SnapshotStore;

/// Counters returned when the scheduler stops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Interval ticks observed.
    pub ticks: usize,
    /// Manual triggers received.
    pub triggers: usize,
    /// Cycles that ran a stock pass.
    pub passes: usize,
    /// Cycles skipped because a pass was already running.
    pub skipped: usize,
    /// Stock or metadata passes that returned an error.
    pub failures: usize,
}

/// Spawns the periodic sync task.
///
/// ## Example
///
/// ```ignore
/// let orchestrator = Arc::new(SyncOrchestrator::new(catalog, store, config));
/// let scheduler = SyncScheduler::spawn(orchestrator.clone());
///
/// scheduler.trigger();
///
/// let stats = scheduler.stop().await;
/// println!("ran {} passes", stats.passes);
/// ```
pub struct SyncScheduler;

impl SyncScheduler {
    /// Start the scheduler with the orchestrator's configured interval.
    ///
    /// The first periodic cycle runs one interval after start. Must be
    /// called from within a tokio runtime.
    pub fn spawn<C, S>(orchestrator: Arc<SyncOrchestrator<C, S>>) -> SchedulerHandle
    where
        C: CatalogReader + 'static,
        S: SnapshotStore + 'static,
    {
        let period = orchestrator.config().sync_interval;
        Self::spawn_with_interval(orchestrator, period)
    }

    /// Start the scheduler with an explicit period.
    pub fn spawn_with_interval<C, S>(
        orchestrator: Arc<SyncOrchestrator<C, S>>,
        period: Duration,
    ) -> SchedulerHandle
    where
        C: CatalogReader + 'static,
        S: SnapshotStore + 'static,
    {
        let cancel = CancellationToken::new();
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
        let token = cancel.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut stats = SchedulerStats::default();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(period_secs = period.as_secs_f64(), "Sync scheduler started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        stats.ticks += 1;
                        run_cycle(&orchestrator, &token, &mut stats).await;
                    }
                    Some(()) = trigger_rx.recv() => {
                        stats.triggers += 1;
                        debug!("Manual sync trigger received");
                        run_cycle(&orchestrator, &token, &mut stats).await;
                    }
                }
            }

            info!(?stats, "Sync scheduler stopped");
            stats
        });

        SchedulerHandle {
            cancel,
            trigger_tx,
            handle: Some(handle),
        }
    }
}

async fn run_cycle<C, S>(
    orchestrator: &SyncOrchestrator<C, S>,
    cancel: &CancellationToken,
    stats: &mut SchedulerStats,
) where
    C: CatalogReader,
    S: SnapshotStore,
{
    if orchestrator.is_running() {
        debug!("Stock sync still running, skipping cycle");
        stats.skipped += 1;
        return;
    }

    stats.passes += 1;
    match orchestrator.sync_all_products_stock_with_cancel(cancel).await {
        Ok(updates) => debug!(updates = updates.len(), "Scheduled stock sync done"),
        Err(SyncError::Cancelled { applied }) => {
            debug!(applied, "Scheduled stock sync cancelled");
            return;
        }
        Err(err) => {
            error!(error = %err, "Scheduled stock sync failed");
            stats.failures += 1;
        }
    }

    if let Err(err) = orchestrator.sync_products_info().await {
        error!(error = %err, "Scheduled product info sync failed");
        stats.failures += 1;
    }
}

/// Handle to a running scheduler. Dropping it stops the task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    trigger_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<SchedulerStats>>,
}

impl SchedulerHandle {
    /// Request a cycle now.
    ///
    /// Returns false when a trigger is already queued or the scheduler has
    /// stopped; a queued trigger already covers this request.
    pub fn trigger(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Signal the scheduler to stop without waiting.
    ///
    /// A running pass stops scheduling batches and returns once its in-flight
    /// batch finishes.
    pub fn signal_stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the scheduler and wait for it to finish.
    pub async fn stop(mut self) -> SchedulerStats {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(stats) => stats,
                Err(err) => {
                    warn!(error = %err, "Sync scheduler task ended abnormally");
                    SchedulerStats::default()
                }
            },
            None => SchedulerStats::default(),
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
