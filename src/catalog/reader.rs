use async_trait::async_trait;
use thiserror::Error;

use super::product::CatalogProduct;

/// Error type for catalog reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The catalog backend could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with something we could not use.
    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
    /// The backend asked us to slow down.
    #[error("catalog rate limited")]
    RateLimited,
}

/// Read access to the remote product catalog.
///
/// Implementations might include:
/// - `InMemoryCatalog` - For testing and single-process scenarios
/// - a storefront API client that pages through the catalog internally
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Return the complete visible catalog.
    async fn list_products(&self) -> Result<Vec<CatalogProduct>, CatalogError>;

    /// Read a single product fresh. `Ok(None)` when it no longer exists.
    async fn get_product(&self, product_id: &str) -> Result<Option<CatalogProduct>, CatalogError>;
}
