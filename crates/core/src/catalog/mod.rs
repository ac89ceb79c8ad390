//! Catalog domain model.
//!
//! A [`Product`] is a read-only projection of a Stripe product plus its default
//! price. The shop never owns product data; only the maintenance CLI writes it
//! back to Stripe.

pub mod attributes;
pub mod filter;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Price, PriceId, ProductId};

pub use attributes::{Availability, Scale};
pub use filter::{
    FilterParams, FilterParseError, PriceBucket, ProductFilter, SortOrder, YearBucket,
    filter_products, sort_products,
};

/// Well-known product metadata keys.
pub mod meta {
    pub const CATEGORY: &str = "category";
    pub const BRAND: &str = "brand";
    pub const SCALE: &str = "scale";
    pub const YEAR: &str = "year";
    pub const SKU: &str = "sku";
    pub const SLUG: &str = "slug";
    pub const AVAILABILITY: &str = "availability";
    pub const STOCK: &str = "stock";
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// URL slug (`metadata.slug`, or derived from the name).
    pub slug: String,
    pub description: Option<String>,
    /// Default price, if the product has one.
    pub price: Option<Price>,
    pub price_id: Option<PriceId>,
    pub images: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Look up a non-empty metadata value.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Category slug: metadata first, otherwise inferred from the name.
    #[must_use]
    pub fn category(&self) -> String {
        self.meta(meta::CATEGORY).map_or_else(
            || attributes::infer_category(&self.name).to_owned(),
            slugify,
        )
    }

    /// Model maker (AUTOart, Maisto, ...).
    #[must_use]
    pub fn brand(&self) -> Option<String> {
        self.meta(meta::BRAND)
            .map(str::to_owned)
            .or_else(|| attributes::extract_brand(&self.name).map(str::to_owned))
    }

    /// Model scale such as `1:18`.
    #[must_use]
    pub fn scale(&self) -> Option<Scale> {
        self.meta(meta::SCALE)
            .and_then(|s| s.parse().ok())
            .or_else(|| attributes::extract_scale(&self.name))
    }

    /// Model year of the real vehicle.
    #[must_use]
    pub fn year(&self) -> Option<u16> {
        self.meta(meta::YEAR)
            .and_then(|y| y.parse().ok())
            .or_else(|| attributes::extract_year(&self.name))
    }

    /// Availability from metadata, falling back to text heuristics.
    #[must_use]
    pub fn availability(&self) -> Availability {
        if let Some(value) = self.meta(meta::AVAILABILITY)
            && let Ok(availability) = value.parse()
        {
            return availability;
        }
        if self.meta(meta::STOCK) == Some("0") {
            return Availability::SoldOut;
        }
        Availability::infer(&self.name, self.description.as_deref())
    }

    /// Price in cents, if priced.
    #[must_use]
    pub fn price_cents(&self) -> Option<i64> {
        self.price.map(|p| p.cents)
    }

    /// First image, used as the thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Turn a product name into a URL slug.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters becomes a single `-`.
///
/// ```
/// use diecast_core::catalog::slugify;
///
/// assert_eq!(slugify("AUTOart 1:18 Lamborghini Countach LP400 (1974)"),
///            "autoart-1-18-lamborghini-countach-lp400-1974");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Normalize a name for duplicate detection: lowercase words joined by spaces.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    slugify(name).replace('-', " ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::CurrencyCode;

    /// Build a priced product for tests.
    pub fn product(id: &str, name: &str, cents: Option<i64>) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            slug: slugify(name),
            description: None,
            price: cents.map(|c| Price::from_cents(c, CurrencyCode::USD)),
            price_id: cents.map(|_| PriceId::new(format!("price_{id}"))),
            images: Vec::new(),
            metadata: BTreeMap::new(),
            active: true,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::product;
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hot Wheels '67 Camaro"), "hot-wheels-67-camaro");
        assert_eq!(slugify("  --Porsche 911-- "), "porsche-911");
        assert_eq!(slugify("Škoda Octavia"), "koda-octavia");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_normalize_name_ignores_punctuation_and_case() {
        assert_eq!(
            normalize_name("Maisto 1:24 Ford GT"),
            normalize_name("maisto 1/24 ford-gt")
        );
    }

    #[test]
    fn test_metadata_wins_over_heuristics() {
        let mut p = product("p1", "Bburago 1:18 Ferrari F40 1987", Some(4999));
        assert_eq!(p.brand().as_deref(), Some("Bburago"));
        assert_eq!(p.scale().map(|s| s.to_string()).as_deref(), Some("1:18"));
        assert_eq!(p.year(), Some(1987));

        p.metadata.insert(meta::BRAND.into(), "Burago Classic".into());
        p.metadata.insert(meta::SCALE.into(), "1:24".into());
        p.metadata.insert(meta::YEAR.into(), "1990".into());
        p.metadata.insert(meta::CATEGORY.into(), "Race Cars".into());
        assert_eq!(p.brand().as_deref(), Some("Burago Classic"));
        assert_eq!(p.scale().map(|s| s.to_string()).as_deref(), Some("1:24"));
        assert_eq!(p.year(), Some(1990));
        assert_eq!(p.category(), "race-cars");
    }

    #[test]
    fn test_blank_metadata_is_ignored() {
        let mut p = product("p1", "Kenworth W900 Truck 1:64", None);
        p.metadata.insert(meta::CATEGORY.into(), "   ".into());
        assert_eq!(p.category(), "trucks");
    }

    #[test]
    fn test_stock_zero_is_sold_out() {
        let mut p = product("p1", "Mini GT Nissan GT-R", Some(1999));
        assert_eq!(p.availability(), Availability::InStock);
        p.metadata.insert(meta::STOCK.into(), "0".into());
        assert_eq!(p.availability(), Availability::SoldOut);
        p.metadata
            .insert(meta::AVAILABILITY.into(), "pre-order".into());
        assert_eq!(p.availability(), Availability::PreOrder);
    }
}
