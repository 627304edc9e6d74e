//! The sync engine: orchestrator, run state, retries and the periodic driver.

mod config;
mod orchestrator;
mod retry;
mod scheduler;
mod state;

pub use config::{
    SyncConfig, DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_SOURCE, DEFAULT_SYNC_INTERVAL_MINUTES,
};
pub use orchestrator::SyncOrchestrator;
pub use retry::{Exhausted, RetryPolicy};
pub use scheduler::{SchedulerHandle, SchedulerStats, SyncScheduler};
pub use state::{PassFlag, PassFlagGuard, PassOutcome, RunGuard, SyncPhase, SyncState, SyncStateCell};
