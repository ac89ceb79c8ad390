//! Cache types for catalog reads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use diecast_core::Product;
use moka::Expiry;
use serde::Serialize;

/// Parameters of a cached product listing.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize)]
pub struct CatalogQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
    /// Maximum number of products to return.
    pub limit: Option<usize>,
}

impl CatalogQuery {
    /// Products in one category.
    #[must_use]
    pub fn category(slug: impl Into<String>) -> Self {
        Self {
            category: Some(slug.into()),
            ..Self::default()
        }
    }

    /// Products matching a search string.
    #[must_use]
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            search: Some(query.into()),
            ..Self::default()
        }
    }

    /// Cap the number of products returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// Every active product.
    All,
    Products(CatalogQuery),
    /// A single product by slug.
    Product(String),
}

/// Cached value types.
///
/// `fetched_at` is when the underlying data left the source. Values derived
/// from a cached listing carry the listing's fetch time, not their own.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products {
        products: Arc<Vec<Product>>,
        fetched_at: Instant,
    },
    Product {
        product: Arc<Product>,
        fetched_at: Instant,
    },
}

impl CacheValue {
    #[must_use]
    pub const fn fetched_at(&self) -> Instant {
        match self {
            Self::Products { fetched_at, .. } | Self::Product { fetched_at, .. } => *fetched_at,
        }
    }
}

/// Expire every entry `ttl` after its data was fetched.
pub(super) struct FetchedAtExpiry {
    pub(super) ttl: Duration,
}

impl FetchedAtExpiry {
    fn remaining(&self, value: &CacheValue, now: Instant) -> Duration {
        (value.fetched_at() + self.ttl).saturating_duration_since(now)
    }
}

impl Expiry<CacheKey, CacheValue> for FetchedAtExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheValue,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(self.remaining(value, created_at))
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheValue,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.remaining(value, updated_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(fetched_at: Instant) -> CacheValue {
        CacheValue::Products {
            products: Arc::new(Vec::new()),
            fetched_at,
        }
    }

    #[test]
    fn test_remaining_lifetime_follows_fetch_time() {
        let expiry = FetchedAtExpiry {
            ttl: Duration::from_secs(60),
        };
        let fetched = Instant::now();

        let fresh = expiry.expire_after_create(&CacheKey::All, &value(fetched), fetched);
        assert_eq!(fresh, Some(Duration::from_secs(60)));

        let derived = expiry.expire_after_create(
            &CacheKey::Products(CatalogQuery::category("racing")),
            &value(fetched),
            fetched + Duration::from_secs(45),
        );
        assert_eq!(derived, Some(Duration::from_secs(15)));

        let late = expiry.expire_after_create(
            &CacheKey::Product("f40".to_string()),
            &value(fetched),
            fetched + Duration::from_secs(90),
        );
        assert_eq!(late, Some(Duration::ZERO));
    }
}
