//! Inventory alerts derived from stock updates.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::diff::StockUpdate;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
pub const DEFAULT_OUT_OF_STOCK_THRESHOLD: i64 = 0;
pub const DEFAULT_RESTOCK_THRESHOLD: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    Restocked,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::LowStock => write!(f, "low_stock"),
            AlertType::OutOfStock => write!(f, "out_of_stock"),
            AlertType::Restocked => write!(f, "restocked"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub product_id: String,
    pub variant_id: String,
    pub current_stock: i64,
    /// The threshold that was crossed.
    pub threshold: i64,
    pub alert_type: AlertType,
    pub timestamp: SystemTime,
}

/// Stock levels at which alerts fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub restock_notify: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_stock: DEFAULT_LOW_STOCK_THRESHOLD,
            out_of_stock: DEFAULT_OUT_OF_STOCK_THRESHOLD,
            restock_notify: DEFAULT_RESTOCK_THRESHOLD,
        }
    }
}

impl AlertThresholds {
    /// Classify a stock update into the alerts it triggers.
    ///
    /// `out_of_stock` and `low_stock` are level checks over disjoint ranges.
    /// `restocked` is edge-triggered: it fires only when the level crosses up
    /// to `restock_notify` from below, not on every pass while stock is high.
    pub fn evaluate(&self, update: &StockUpdate) -> Vec<StockAlert> {
        if update.previous_level == update.new_level {
            return Vec::new();
        }

        let level = update.new_level;
        let alert = |alert_type, threshold| StockAlert {
            product_id: update.product_id.clone(),
            variant_id: update.variant_id.clone(),
            current_stock: level,
            threshold,
            alert_type,
            timestamp: update.timestamp,
        };

        let mut alerts = Vec::new();
        if level <= self.out_of_stock {
            alerts.push(alert(AlertType::OutOfStock, self.out_of_stock));
        } else if level <= self.low_stock {
            alerts.push(alert(AlertType::LowStock, self.low_stock));
        }
        if level >= self.restock_notify && update.previous_level < self.restock_notify {
            alerts.push(alert(AlertType::Restocked, self.restock_notify));
        }
        alerts
    }
}
