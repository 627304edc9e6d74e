use serde::{Deserialize, Serialize};

/// A sellable variant of a catalog product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub id: String,
    pub title: String,
    /// Price in the store currency's minor unit.
    pub price_cents: u64,
    pub available: bool,
    /// Inventory on hand. Negative when the variant is oversold.
    pub inventory: i64,
}

impl CatalogVariant {
    pub fn new(id: impl Into<String>, inventory: i64) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            price_cents: 0,
            available: inventory > 0,
            inventory,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_price_cents(mut self, price_cents: u64) -> Self {
        self.price_cents = price_cents;
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}

/// A product as read from the remote catalog.
///
/// Read fresh on every pass and never mutated by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_urls: Vec<String>,
    pub variants: Vec<CatalogVariant>,
    pub tags: Vec<String>,
}

impl CatalogProduct {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            image_urls: Vec::new(),
            variants: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_urls.push(url.into());
        self
    }

    pub fn with_variant(mut self, variant: CatalogVariant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Lowest variant price, or `None` for a product without variants.
    pub fn min_price_cents(&self) -> Option<u64> {
        self.variants.iter().map(|v| v.price_cents).min()
    }

    /// True when at least one variant can be bought.
    pub fn is_available(&self) -> bool {
        self.variants.iter().any(|v| v.available)
    }

    /// Total inventory across variants.
    pub fn total_inventory(&self) -> i64 {
        self.variants.iter().map(|v| v.inventory).sum()
    }
}
