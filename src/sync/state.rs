//! Shared run state of the synchronization engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;

/// Where the stock state machine currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Running,
}

/// How the last pass left `Running`. A `Failed` pass is recorded here and
/// the machine is back in `Idle`; it does not block the next pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// Every product synced.
    Completed,
    /// The pass finished but some products exhausted their retries.
    PartialFailure,
    /// The pass stopped early (listing failure, cancellation).
    Failed,
}

/// Point-in-time copy of the run state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub is_running: bool,
    pub last_sync: Option<SystemTime>,
    pub error_count: u32,
    pub current_batch: usize,
    pub total_products: usize,
    pub last_error: Option<String>,
    pub last_outcome: Option<PassOutcome>,
}

impl SyncState {
    /// True when the UI should show a non-fatal sync warning.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

#[derive(Debug, Default)]
struct Counters {
    last_sync: Option<SystemTime>,
    error_count: u32,
    current_batch: usize,
    total_products: usize,
    last_error: Option<String>,
    last_outcome: Option<PassOutcome>,
}

/// The single owner of `SyncState`.
///
/// The running flag is an `AtomicBool` taken with compare-and-swap, so two
/// near-simultaneous triggers cannot both start a pass. The counters sit
/// behind a mutex that is only held for field updates, never across an
/// await.
#[derive(Debug, Default)]
pub struct SyncStateCell {
    running: AtomicBool,
    counters: Mutex<Counters>,
}

impl SyncStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        // counters are plain values; a panic mid-update cannot leave them torn
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SyncPhase {
        if self.is_running() {
            SyncPhase::Running
        } else {
            SyncPhase::Idle
        }
    }

    /// Consistent copy of the state.
    pub fn snapshot(&self) -> SyncState {
        let counters = self.counters();
        SyncState {
            is_running: self.is_running(),
            last_sync: counters.last_sync,
            error_count: counters.error_count,
            current_batch: counters.current_batch,
            total_products: counters.total_products,
            last_error: counters.last_error.clone(),
            last_outcome: counters.last_outcome,
        }
    }

    /// Try to move `Idle -> Running`. `None` when a pass is already active;
    /// in that case nothing is mutated.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let mut counters = self.counters();
        counters.current_batch = 0;
        counters.total_products = 0;
        drop(counters);

        Some(RunGuard {
            cell: self,
            finished: false,
        })
    }

    /// Count one product whose retries ran out.
    pub fn record_failure(&self, error: &str) {
        let mut counters = self.counters();
        counters.error_count = counters.error_count.saturating_add(1);
        counters.last_error = Some(error.to_string());
    }

    /// Clear the error counter after a fully successful sync.
    pub fn clear_errors(&self) {
        let mut counters = self.counters();
        counters.error_count = 0;
        counters.last_error = None;
    }

    pub fn error_count(&self) -> u32 {
        self.counters().error_count
    }
}

/// Proof that the caller owns the running pass.
///
/// Dropping the guard always clears the running flag, so the machine cannot
/// stay in `Running` after an early return, a panic, or a dropped future.
#[derive(Debug)]
pub struct RunGuard<'a> {
    cell: &'a SyncStateCell,
    finished: bool,
}

impl RunGuard<'_> {
    pub fn set_total_products(&self, total: usize) {
        self.cell.counters().total_products = total;
    }

    /// Record that batch `batch` (1-based) has started.
    pub fn begin_batch(&self, batch: usize) {
        let mut counters = self.cell.counters();
        counters.current_batch = counters.current_batch.max(batch);
    }

    /// Finish the pass: stamp `last_sync`, reset the error counter if no
    /// product failed, and return to `Idle`. Returns the final error count.
    pub fn complete(mut self, now: SystemTime, failures: usize) -> u32 {
        let mut counters = self.cell.counters();
        counters.last_sync = Some(now);
        if failures == 0 {
            counters.error_count = 0;
            counters.last_error = None;
            counters.last_outcome = Some(PassOutcome::Completed);
        } else {
            counters.last_outcome = Some(PassOutcome::PartialFailure);
        }
        let error_count = counters.error_count;
        self.cell.running.store(false, Ordering::Release);
        drop(counters);
        self.finished = true;
        error_count
    }

    /// Leave the pass without stamping `last_sync` (cancellation, listing
    /// failure). The outcome is recorded as `Failed`.
    pub fn abort(mut self, error: &str) {
        let mut counters = self.cell.counters();
        counters.last_error = Some(error.to_string());
        counters.last_outcome = Some(PassOutcome::Failed);
        self.cell.running.store(false, Ordering::Release);
        drop(counters);
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Sync pass exited abnormally, clearing running flag");
            self.cell.running.store(false, Ordering::Release);
        }
    }
}

/// Non-overlap flag for passes that do not touch `SyncState`.
#[derive(Debug, Default)]
pub struct PassFlag(AtomicBool);

impl PassFlag {
    pub fn try_acquire(&self) -> Option<PassFlagGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(PassFlagGuard(&self.0))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct PassFlagGuard<'a>(&'a AtomicBool);

impl Drop for PassFlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
