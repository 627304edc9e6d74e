use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use super::forwarder::{ForwardError, SecondaryForwarder};
use crate::alert::StockAlert;
use crate::snapshot::StockKey;

/// A simple forwarder that logs pushes through `tracing` or into a buffer.
#[derive(Clone, Default)]
pub struct LogForwarder {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogForwarder {
    pub fn new() -> Self {
        LogForwarder { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogForwarder {
            buffer: Some(buffer),
        }
    }

    fn record(&self, line: String) -> Result<(), ForwardError> {
        match &self.buffer {
            Some(buffer) => {
                let mut buffer = buffer.lock().map_err(|_| ForwardError::BufferPoisoned)?;
                buffer.push(line);
            }
            None => info!(target: "storefront_sync::forward", "{}", line),
        }
        Ok(())
    }
}

#[async_trait]
impl SecondaryForwarder for LogForwarder {
    async fn push_stock_level(&self, key: &StockKey, level: i64) -> Result<(), ForwardError> {
        self.record(format!("[STOCK] {} {}", key, level))
    }

    async fn push_alert(&self, alert: &StockAlert) -> Result<(), ForwardError> {
        self.record(format!(
            "[ALERT] {} {}:{} stock={} threshold={}",
            alert.alert_type, alert.product_id, alert.variant_id, alert.current_stock, alert.threshold
        ))
    }
}
