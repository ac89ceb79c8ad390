//! Product list filtering and sorting.
//!
//! Everything here works on an already-fetched list of products. Matching is
//! plain case-insensitive substring search plus the attribute heuristics in
//! [`super::attributes`]; there is no index and no pagination.

use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use super::attributes::{Availability, InvalidAvailability, InvalidScale, Scale};
use super::{Product, slugify};

/// Errors from parsing filter query parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterParseError {
    #[error("invalid price range: {0}")]
    Price(String),
    #[error("invalid year range: {0}")]
    Year(String),
    #[error(transparent)]
    Scale(#[from] InvalidScale),
    #[error(transparent)]
    Availability(#[from] InvalidAvailability),
    #[error("invalid sort order: {0}")]
    Sort(String),
}

/// Half-open price range in cents: `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBucket {
    pub min_cents: i64,
    pub max_cents: Option<i64>,
}

impl PriceBucket {
    /// Whether a price falls inside the bucket.
    #[must_use]
    pub fn contains(&self, cents: i64) -> bool {
        cents >= self.min_cents && self.max_cents.is_none_or(|max| cents < max)
    }
}

impl FromStr for PriceBucket {
    type Err = FilterParseError;

    /// Parses dollar ranges: `75-150`, `300+`, `under-25`, `over-300`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FilterParseError::Price(s.to_owned());
        let s_trim = s.trim();

        let (min, max) = if let Some(max) = s_trim.strip_prefix("under-") {
            (0, Some(dollars_to_cents(max).ok_or_else(err)?))
        } else if let Some(min) = s_trim
            .strip_prefix("over-")
            .or_else(|| s_trim.strip_suffix('+'))
        {
            (dollars_to_cents(min).ok_or_else(err)?, None)
        } else {
            let (lo, hi) = s_trim.split_once('-').ok_or_else(err)?;
            (
                dollars_to_cents(lo).ok_or_else(err)?,
                Some(dollars_to_cents(hi).ok_or_else(err)?),
            )
        };

        if max.is_some_and(|max| max <= min) {
            return Err(err());
        }
        Ok(Self {
            min_cents: min,
            max_cents: max,
        })
    }
}

fn dollars_to_cents(s: &str) -> Option<i64> {
    let amount = Decimal::from_str(s.trim()).ok()?;
    if amount.is_sign_negative() {
        return None;
    }
    (amount * Decimal::ONE_HUNDRED).trunc().to_i64()
}

/// Inclusive range of model years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearBucket {
    pub from: Option<u16>,
    pub to: Option<u16>,
}

impl YearBucket {
    /// Whether a year falls inside the bucket.
    #[must_use]
    pub fn contains(&self, year: u16) -> bool {
        self.from.is_none_or(|from| year >= from) && self.to.is_none_or(|to| year <= to)
    }
}

impl FromStr for YearBucket {
    type Err = FilterParseError;

    /// Parses `pre-1970`, `1970s`, `1960-1979`, `2000+` and a single `1967`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FilterParseError::Year(s.to_owned());
        let year = |v: &str| v.trim().parse::<u16>().map_err(|_| err());
        let s_trim = s.trim();

        let bucket = if let Some(before) = s_trim.strip_prefix("pre-") {
            Self {
                from: None,
                to: Some(year(before)?.checked_sub(1).ok_or_else(err)?),
            }
        } else if let Some(decade) = s_trim.strip_suffix('s') {
            let start = year(decade)?;
            Self {
                from: Some(start),
                to: Some(start.saturating_add(9)),
            }
        } else if let Some(start) = s_trim.strip_suffix('+') {
            Self {
                from: Some(year(start)?),
                to: None,
            }
        } else if let Some((lo, hi)) = s_trim.split_once('-') {
            let (lo, hi) = (year(lo)?, year(hi)?);
            if hi < lo {
                return Err(err());
            }
            Self {
                from: Some(lo),
                to: Some(hi),
            }
        } else {
            let exact = year(s_trim)?;
            Self {
                from: Some(exact),
                to: Some(exact),
            }
        };
        Ok(bucket)
    }
}

/// Sort orders offered on listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Catalog order as returned by the API.
    #[default]
    Featured,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Newest,
}

impl SortOrder {
    /// Query-string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
            Self::Newest => "newest",
        }
    }
}

impl FromStr for SortOrder {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "featured" | "" => Ok(Self::Featured),
            "price-asc" | "price-low-high" => Ok(Self::PriceAsc),
            "price-desc" | "price-high-low" => Ok(Self::PriceDesc),
            "name-asc" => Ok(Self::NameAsc),
            "name-desc" => Ok(Self::NameDesc),
            "newest" => Ok(Self::Newest),
            other => Err(FilterParseError::Sort(other.to_owned())),
        }
    }
}

/// A set of filters. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub price: Option<PriceBucket>,
    /// Substring of the brand, name or description.
    pub brand: Option<String>,
    pub scale: Option<Scale>,
    pub year: Option<YearBucket>,
    pub availability: Option<Availability>,
    /// Category slug.
    pub category: Option<String>,
    /// Free-text search; every whitespace-separated term must match.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Whether the product passes every configured filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(bucket) = &self.price
            && !product.price_cents().is_some_and(|c| bucket.contains(c))
        {
            return false;
        }

        if let Some(brand) = &self.brand
            && !text_matches(product, &brand.to_lowercase())
        {
            return false;
        }

        if let Some(scale) = self.scale
            && product.scale() != Some(scale)
        {
            return false;
        }

        if let Some(bucket) = &self.year
            && !product.year().is_some_and(|y| bucket.contains(y))
        {
            return false;
        }

        if let Some(availability) = self.availability
            && product.availability() != availability
        {
            return false;
        }

        if let Some(category) = &self.category
            && product.category() != slugify(category)
        {
            return false;
        }

        if let Some(search) = &self.search {
            let search = search.to_lowercase();
            if !search
                .split_whitespace()
                .all(|term| text_matches(product, term))
            {
                return false;
            }
        }

        true
    }

    /// True when no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Case-insensitive substring match against name, description and brand.
/// `needle` must already be lowercase.
fn text_matches(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || product
            .brand()
            .is_some_and(|b| b.to_lowercase().contains(needle))
}

/// Keep the products that match `filter`, preserving their order.
#[must_use]
pub fn filter_products(products: &[Product], filter: &ProductFilter) -> Vec<Product> {
    products
        .iter()
        .filter(|p| filter.matches(p))
        .cloned()
        .collect()
}

/// Stable sort by `order`. Unpriced products sort last for price orders.
#[must_use]
pub fn sort_products(mut products: Vec<Product>, order: SortOrder) -> Vec<Product> {
    match order {
        SortOrder::Featured => {}
        SortOrder::PriceAsc => {
            products.sort_by(|a, b| compare_prices(a.price_cents(), b.price_cents(), false));
        }
        SortOrder::PriceDesc => {
            products.sort_by(|a, b| compare_prices(a.price_cents(), b.price_cents(), true));
        }
        SortOrder::NameAsc => products.sort_by_cached_key(|p| p.name.to_lowercase()),
        SortOrder::NameDesc => {
            products.sort_by(|a, b| b.name.to_lowercase().cmp(&a.name.to_lowercase()));
        }
        SortOrder::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    products
}

fn compare_prices(a: Option<i64>, b: Option<i64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Raw listing query parameters (`?price=75-150&brand=maisto&sort=price-asc`).
///
/// Empty values are treated as unset, since HTML forms submit blank fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub price: Option<String>,
    pub brand: Option<String>,
    pub scale: Option<String>,
    pub year: Option<String>,
    pub availability: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
}

impl FilterParams {
    /// Parse into a filter and sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is present but malformed.
    pub fn parse(&self) -> Result<(ProductFilter, SortOrder), FilterParseError> {
        let filter = ProductFilter {
            price: non_empty(self.price.as_deref()).map(str::parse).transpose()?,
            brand: non_empty(self.brand.as_deref()).map(str::to_owned),
            scale: non_empty(self.scale.as_deref())
                .map(str::parse)
                .transpose()?,
            year: non_empty(self.year.as_deref()).map(str::parse).transpose()?,
            availability: non_empty(self.availability.as_deref())
                .map(str::parse)
                .transpose()?,
            category: non_empty(self.category.as_deref()).map(str::to_owned),
            search: non_empty(self.q.as_deref()).map(str::to_owned),
        };
        let sort: SortOrder = non_empty(self.sort.as_deref())
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        Ok((filter, sort))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
