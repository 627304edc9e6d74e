use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::snapshot::ProductSnapshot;

/// A mutable metadata field of a product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Title,
    Description,
    Price,
    Images,
    Availability,
}

impl ProductField {
    pub const ALL: [ProductField; 5] = [
        ProductField::Title,
        ProductField::Description,
        ProductField::Price,
        ProductField::Images,
        ProductField::Availability,
    ];
}

/// Detected metadata drift for one product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub product_id: String,
    pub changed: Vec<ProductField>,
    pub previous: Option<ProductSnapshot>,
    pub current: ProductSnapshot,
    pub timestamp: SystemTime,
}

impl ProductUpdate {
    pub fn is_new(&self) -> bool {
        self.previous.is_none()
    }
}

/// Fields that differ between the stored snapshot and the fresh one.
///
/// With no stored snapshot every field counts as changed.
pub fn changed_fields(
    previous: Option<&ProductSnapshot>,
    current: &ProductSnapshot,
) -> Vec<ProductField> {
    let Some(previous) = previous else {
        return ProductField::ALL.to_vec();
    };

    ProductField::ALL
        .into_iter()
        .filter(|field| match field {
            ProductField::Title => previous.title != current.title,
            ProductField::Description => previous.description != current.description,
            ProductField::Price => previous.price_cents != current.price_cents,
            ProductField::Images => previous.image_urls != current.image_urls,
            ProductField::Availability => previous.available != current.available,
        })
        .collect()
}

/// Diff a fresh snapshot against the stored one; `None` when nothing changed.
pub fn diff_product(
    product_id: &str,
    previous: Option<ProductSnapshot>,
    current: ProductSnapshot,
    now: SystemTime,
) -> Option<ProductUpdate> {
    let changed = changed_fields(previous.as_ref(), &current);
    if changed.is_empty() {
        return None;
    }
    Some(ProductUpdate {
        product_id: product_id.to_string(),
        changed,
        previous,
        current,
        timestamp: now,
    })
}
