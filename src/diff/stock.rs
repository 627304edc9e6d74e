use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogProduct;
use crate::snapshot::StockKey;

/// A detected change in the stock level of one variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub product_id: String,
    pub variant_id: String,
    pub previous_level: i64,
    pub new_level: i64,
    pub timestamp: SystemTime,
    pub source: String,
}

impl StockUpdate {
    pub fn key(&self) -> StockKey {
        StockKey::new(&self.product_id, &self.variant_id)
    }

    /// Signed change in stock.
    pub fn delta(&self) -> i64 {
        self.new_level - self.previous_level
    }
}

/// Compare the variants of `product` against their stored levels.
///
/// `stored` maps variant id to the last stored level; a variant missing from
/// it has never been seen and is diffed against zero. Updates come back in
/// catalog variant order. Variants whose level is unchanged yield nothing.
///
/// A first observation always yields an update, even at zero stock, so the
/// stock record gets created.
pub fn diff_stock(
    product: &CatalogProduct,
    stored: &HashMap<String, i64>,
    source: &str,
    now: SystemTime,
) -> Vec<StockUpdate> {
    product
        .variants
        .iter()
        .filter_map(|variant| {
            let previous = stored.get(&variant.id).copied();
            if previous == Some(variant.inventory) {
                return None;
            }
            Some(StockUpdate {
                product_id: product.id.clone(),
                variant_id: variant.id.clone(),
                previous_level: previous.unwrap_or(0),
                new_level: variant.inventory,
                timestamp: now,
                source: source.to_string(),
            })
        })
        .collect()
}
