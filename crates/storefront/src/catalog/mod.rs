//! Catalog read cache.
//!
//! Every catalog read in the storefront goes through [`CatalogService`], which
//! keeps Stripe responses in a `moka` cache for a fixed TTL. Within the TTL the
//! cached value is returned as-is; once it expires the next call refetches
//! and overwrites it. There is no other eviction and nothing is persisted, so
//! a restart starts cold.
//!
//! Filtered listings are derived from the cached full catalog rather than
//! fetched separately, so one Stripe listing serves every category page. A
//! derived entry expires together with the listing it was built from.

mod cache;
mod performance;

pub use cache::{CacheKey, CacheValue, CatalogQuery};
use cache::FetchedAtExpiry;
pub use performance::{CacheOutcome, OperationStats, PerformanceMonitor, PerformanceSnapshot};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use diecast_core::Product;
use diecast_core::catalog::filter::{ProductFilter, filter_products};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::stripe::StripeError;

/// Where catalog data comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every active product.
    async fn list_products(&self) -> Result<Vec<Product>, StripeError>;

    /// A single active product by slug.
    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StripeError>;

    /// Cheapest request that proves the source is reachable.
    async fn ping(&self) -> Result<(), StripeError> {
        self.list_products().await.map(|_| ())
    }
}

/// Cached, instrumented access to a [`CatalogSource`].
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    source: Arc<dyn CatalogSource>,
    cache: Cache<CacheKey, CacheValue>,
    ttl: Duration,
    monitor: PerformanceMonitor,
}

impl CatalogService {
    /// Wrap a source with a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration, monitor: PerformanceMonitor) -> Self {
        let cache = Cache::builder()
            .expire_after(FetchedAtExpiry { ttl })
            .build();
        Self {
            inner: Arc::new(CatalogServiceInner {
                source,
                cache,
                ttl,
                monitor,
            }),
        }
    }

    /// Every active product.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has to be queried and fails.
    #[instrument(skip(self))]
    pub async fn all(&self) -> Result<Arc<Vec<Product>>, StripeError> {
        let start = Instant::now();
        let (products, _, outcome) = self.all_cached().await?;
        self.inner.monitor.record("all", start.elapsed(), outcome);
        Ok(products)
    }

    /// Products matching a category/search query, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has to be queried and fails.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &CatalogQuery) -> Result<Arc<Vec<Product>>, StripeError> {
        let start = Instant::now();
        let key = CacheKey::Products(query.clone());

        if let Some(CacheValue::Products { products, .. }) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product listing");
            self.inner
                .monitor
                .record("list", start.elapsed(), CacheOutcome::Hit);
            return Ok(products);
        }

        let (all, fetched_at, _) = self.all_cached().await?;
        let filter = ProductFilter {
            category: query.category.clone(),
            search: query.search.clone(),
            ..ProductFilter::default()
        };
        let mut products = filter_products(&all, &filter);
        if let Some(limit) = query.limit {
            products.truncate(limit);
        }
        let products = Arc::new(products);

        self.inner
            .cache
            .insert(
                key,
                CacheValue::Products {
                    products: Arc::clone(&products),
                    fetched_at,
                },
            )
            .await;
        self.inner
            .monitor
            .record("list", start.elapsed(), CacheOutcome::Miss);
        Ok(products)
    }

    /// A single product by slug. Unknown slugs are not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has to be queried and fails.
    #[instrument(skip(self))]
    pub async fn product_by_slug(&self, slug: &str) -> Result<Option<Arc<Product>>, StripeError> {
        let start = Instant::now();
        let key = CacheKey::Product(slug.to_string());

        if let Some(CacheValue::Product { product, .. }) = self.inner.cache.get(&key).await {
            self.inner
                .monitor
                .record("product", start.elapsed(), CacheOutcome::Hit);
            return Ok(Some(product));
        }

        // A warm full listing already has the product.
        if let Some(CacheValue::Products {
            products: all,
            fetched_at,
        }) = self.inner.cache.get(&CacheKey::All).await
            && let Some(found) = all.iter().find(|p| p.slug == slug)
        {
            let product = Arc::new(found.clone());
            self.inner
                .cache
                .insert(
                    key,
                    CacheValue::Product {
                        product: Arc::clone(&product),
                        fetched_at,
                    },
                )
                .await;
            self.inner
                .monitor
                .record("product", start.elapsed(), CacheOutcome::Hit);
            return Ok(Some(product));
        }

        let fetched_at = Instant::now();
        let found = self.inner.source.product_by_slug(slug).await?.map(Arc::new);
        if let Some(product) = &found {
            self.inner
                .cache
                .insert(
                    key,
                    CacheValue::Product {
                        product: Arc::clone(product),
                        fetched_at,
                    },
                )
                .await;
        }
        self.inner
            .monitor
            .record("product", start.elapsed(), CacheOutcome::Miss);
        Ok(found)
    }

    /// Check the source directly, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the source's error when it is unreachable.
    #[instrument(skip(self))]
    pub async fn ping_source(&self) -> Result<(), StripeError> {
        let start = Instant::now();
        let result = self.inner.source.ping().await;
        self.inner
            .monitor
            .record("ping", start.elapsed(), CacheOutcome::Miss);
        result
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        tracing::info!("Catalog cache invalidated");
    }

    /// Number of live cache entries.
    pub async fn entry_count(&self) -> u64 {
        self.inner.cache.run_pending_tasks().await;
        self.inner.cache.entry_count()
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    #[must_use]
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.inner.monitor
    }

    async fn all_cached(
        &self,
    ) -> Result<(Arc<Vec<Product>>, Instant, CacheOutcome), StripeError> {
        if let Some(CacheValue::Products {
            products,
            fetched_at,
        }) = self.inner.cache.get(&CacheKey::All).await
        {
            return Ok((products, fetched_at, CacheOutcome::Hit));
        }

        let fetched_at = Instant::now();
        let products = Arc::new(self.inner.source.list_products().await?);
        debug!(count = products.len(), "Fetched catalog from source");
        self.inner
            .cache
            .insert(
                CacheKey::All,
                CacheValue::Products {
                    products: Arc::clone(&products),
                    fetched_at,
                },
            )
            .await;
        Ok((products, fetched_at, CacheOutcome::Miss))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use diecast_core::catalog::slugify;
    use diecast_core::{CurrencyCode, Price, PriceId, ProductId};

    use super::*;

    fn product(id: &str, name: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            price: Some(Price::from_cents(4_999, CurrencyCode::USD)),
            price_id: Some(PriceId::new(format!("price_{id}"))),
            images: vec![],
            metadata: BTreeMap::from([("category".to_string(), category.to_string())]),
            active: true,
            created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[derive(Default)]
    struct CountingSource {
        products: Mutex<Vec<Product>>,
        list_calls: AtomicUsize,
        slug_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn list_products(&self) -> Result<Vec<Product>, StripeError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StripeError::RateLimited(1));
            }
            Ok(self.products.lock().unwrap().clone())
        }

        async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StripeError> {
            self.slug_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .products
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.slug == slug)
                .cloned())
        }
    }

    fn service(source: &Arc<CountingSource>, ttl: Duration) -> CatalogService {
        let dyn_source: Arc<dyn CatalogSource> = Arc::clone(source) as Arc<dyn CatalogSource>;
        CatalogService::new(dyn_source, ttl, PerformanceMonitor::new(Duration::from_secs(1)))
    }

    fn source() -> Arc<CountingSource> {
        Arc::new(CountingSource {
            products: Mutex::new(vec![
                product("prod_1", "AUTOart 1:18 Porsche 911 GT3", "racing"),
                product("prod_2", "Maisto 1:24 Ford F-150", "trucks"),
                product("prod_3", "Spark 1:43 Porsche 917K", "racing"),
            ]),
            ..CountingSource::default()
        })
    }

    #[tokio::test]
    async fn test_cached_within_ttl_and_refetched_after() {
        let source = source();
        let catalog = service(&source, Duration::from_millis(200));

        assert_eq!(catalog.all().await.unwrap().len(), 3);
        assert_eq!(catalog.all().await.unwrap().len(), 3);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        catalog.all().await.unwrap();
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);

        let stats = &catalog.monitor().snapshot().operations["all"];
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 2);
    }

    #[tokio::test]
    async fn test_list_derives_from_full_catalog() {
        let source = source();
        let catalog = service(&source, Duration::from_secs(60));

        let racing = catalog.list(&CatalogQuery::category("racing")).await.unwrap();
        assert_eq!(racing.len(), 2);

        let porsche = catalog
            .list(&CatalogQuery::search("porsche").with_limit(1))
            .await
            .unwrap();
        assert_eq!(porsche.len(), 1);
        assert_eq!(porsche[0].id.as_str(), "prod_1");

        let again = catalog.list(&CatalogQuery::category("racing")).await.unwrap();
        assert!(Arc::ptr_eq(&racing, &again));
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_derived_listing_expires_with_its_source_listing() {
        let source = source();
        let catalog = service(&source, Duration::from_millis(400));

        catalog.all().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let trucks = catalog.list(&CatalogQuery::category("trucks")).await.unwrap();
        assert_eq!(trucks[0].name, "Maisto 1:24 Ford F-150");
        catalog.product_by_slug("maisto-1-24-ford-f-150").await.unwrap();

        if let Some(truck) = source.products.lock().unwrap().get_mut(1) {
            truck.name = "Maisto 1:24 Ford F-150 Raptor".to_string();
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        // 600ms after the fetch: both derived entries are gone with the listing.
        let trucks = catalog.list(&CatalogQuery::category("trucks")).await.unwrap();
        assert_eq!(trucks[0].name, "Maisto 1:24 Ford F-150 Raptor");
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
        let product = catalog
            .product_by_slug("maisto-1-24-ford-f-150")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.name, "Maisto 1:24 Ford F-150 Raptor");
    }

    #[tokio::test]
    async fn test_product_by_slug_uses_warm_listing() {
        let source = source();
        let catalog = service(&source, Duration::from_secs(60));

        catalog.all().await.unwrap();
        let product = catalog
            .product_by_slug("maisto-1-24-ford-f-150")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.id.as_str(), "prod_2");
        assert_eq!(source.slug_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_cached() {
        let source = source();
        let catalog = service(&source, Duration::from_secs(60));

        assert!(catalog.product_by_slug("nope").await.unwrap().is_none());
        assert!(catalog.product_by_slug("nope").await.unwrap().is_none());
        assert_eq!(source.slug_calls.load(Ordering::SeqCst), 2);
        assert_eq!(catalog.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let source = source();
        let catalog = service(&source, Duration::from_secs(60));

        catalog.all().await.unwrap();
        catalog.list(&CatalogQuery::category("trucks")).await.unwrap();
        assert_eq!(catalog.entry_count().await, 2);

        catalog.invalidate_all();
        assert_eq!(catalog.entry_count().await, 0);
        catalog.all().await.unwrap();
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ping_bypasses_warm_cache() {
        let source = source();
        let catalog = service(&source, Duration::from_secs(60));

        catalog.all().await.unwrap();
        catalog.ping_source().await.unwrap();
        catalog.ping_source().await.unwrap();
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let source = Arc::new(CountingSource {
            fail: true,
            ..CountingSource::default()
        });
        let catalog = service(&source, Duration::from_secs(60));

        assert!(catalog.all().await.is_err());
        assert!(catalog.all().await.is_err());
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }
}
