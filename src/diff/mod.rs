//! Drift detection between a fresh catalog read and the stored snapshot.
//!
//! Both differs are pure: the caller loads the stored state, the differ
//! compares, and the caller applies the result.

mod product;
mod stock;

pub use product::{changed_fields, diff_product, ProductField, ProductUpdate};
pub use stock::{diff_stock, StockUpdate};
