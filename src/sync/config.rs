//! Synchronization configuration with defaults.
//!
//! The options mirror the storefront's settings document: `retryAttempts`,
//! `retryDelayMs`, `batchSize`, `syncIntervalMinutes`, `lowStockThreshold`,
//! `outOfStockThreshold`, `restockThreshold`, plus `batchDelayMs`,
//! `batchTimeoutMs` and `source`. Every option is optional.

use std::time::Duration;

use serde::Deserialize;

use crate::alert::{
    AlertThresholds, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_OUT_OF_STOCK_THRESHOLD,
    DEFAULT_RESTOCK_THRESHOLD,
};
use crate::error::ConfigError;

/// Default number of attempts per product (first try included)
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default pause between attempts (5 seconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Default number of products synced concurrently in one batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default pause between batches (1 second)
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1_000;

/// Default period of the scheduler (15 minutes)
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 15;

/// Default `source` tag stamped on stock updates
pub const DEFAULT_SOURCE: &str = "catalog-sync";

/// Synchronization configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Attempts per product before it counts as failed
    pub retry_attempts: u32,

    /// Pause between two attempts of the same product
    pub retry_delay: Duration,

    /// Products per batch, which is also the in-batch concurrency
    pub batch_size: usize,

    /// Pause between two batches of a pass
    pub batch_delay: Duration,

    /// Abandon a batch that runs longer than this
    pub batch_timeout: Option<Duration>,

    /// Period of the scheduler
    pub sync_interval: Duration,

    /// Alert thresholds
    pub thresholds: AlertThresholds,

    /// Tag stamped on every stock update
    pub source: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            batch_timeout: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_MINUTES * 60),
            thresholds: AlertThresholds::default(),
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

/// Wire form of the settings document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct RawSyncConfig {
    retry_attempts: u32,
    retry_delay_ms: u64,
    batch_size: usize,
    batch_delay_ms: u64,
    batch_timeout_ms: Option<u64>,
    sync_interval_minutes: u64,
    low_stock_threshold: i64,
    out_of_stock_threshold: i64,
    restock_threshold: i64,
    source: String,
}

impl Default for RawSyncConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            batch_timeout_ms: None,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            out_of_stock_threshold: DEFAULT_OUT_OF_STOCK_THRESHOLD,
            restock_threshold: DEFAULT_RESTOCK_THRESHOLD,
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl From<RawSyncConfig> for SyncConfig {
    fn from(raw: RawSyncConfig) -> Self {
        Self {
            retry_attempts: raw.retry_attempts,
            retry_delay: Duration::from_millis(raw.retry_delay_ms),
            batch_size: raw.batch_size,
            batch_delay: Duration::from_millis(raw.batch_delay_ms),
            batch_timeout: raw.batch_timeout_ms.map(Duration::from_millis),
            sync_interval: Duration::from_secs(raw.sync_interval_minutes.saturating_mul(60)),
            thresholds: AlertThresholds {
                low_stock: raw.low_stock_threshold,
                out_of_stock: raw.out_of_stock_threshold,
                restock_notify: raw.restock_threshold,
            },
            source: raw.source,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON settings document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawSyncConfig = serde_json::from_str(json)?;
        let config = SyncConfig::from(raw);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retryAttempts",
                reason: "must be at least 1",
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batchSize",
                reason: "must be at least 1",
            });
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "syncIntervalMinutes",
                reason: "must be at least 1",
            });
        }
        if self.thresholds.low_stock < self.thresholds.out_of_stock {
            return Err(ConfigError::Invalid {
                field: "lowStockThreshold",
                reason: "must not be below outOfStockThreshold",
            });
        }
        Ok(())
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = Some(timeout);
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}
