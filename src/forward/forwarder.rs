use async_trait::async_trait;
use thiserror::Error;

use crate::alert::StockAlert;
use crate::snapshot::StockKey;

/// Error type for secondary-store pushes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("secondary store unreachable: {0}")]
    ConnectionFailed(String),
    #[error("secondary store rejected record: {0}")]
    Rejected(String),
    #[error("forwarder buffer poisoned")]
    BufferPoisoned,
}

/// Best-effort mirror of confirmed stock levels and alerts.
///
/// The secondary store is advisory (analytics, CRM). The engine logs and
/// drops any error returned here; it never retries a push and never rolls
/// back the primary sync because of one.
#[async_trait]
pub trait SecondaryForwarder: Send + Sync {
    /// Mirror a stock level that has been stored locally.
    async fn push_stock_level(&self, key: &StockKey, level: i64) -> Result<(), ForwardError>;

    /// Mirror an inventory alert.
    async fn push_alert(&self, alert: &StockAlert) -> Result<(), ForwardError>;
}

/// Forwarder that drops everything. Used when no secondary store is wired.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopForwarder;

#[async_trait]
impl SecondaryForwarder for NoopForwarder {
    async fn push_stock_level(&self, _key: &StockKey, _level: i64) -> Result<(), ForwardError> {
        Ok(())
    }

    async fn push_alert(&self, _alert: &StockAlert) -> Result<(), ForwardError> {
        Ok(())
    }
}
