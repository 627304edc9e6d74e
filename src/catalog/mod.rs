//! Catalog - the remote product source the engine reads from.
//!
//! The engine treats the catalog as an external collaborator: it only needs
//! `list_products()` for a full pass and `get_product()` for a fresh
//! per-product read. Pagination, authentication and transport belong to the
//! implementation.

mod in_memory;
mod product;
mod reader;

pub use in_memory::InMemoryCatalog;
pub use product::{CatalogProduct, CatalogVariant};
pub use reader::{CatalogError, CatalogReader};
