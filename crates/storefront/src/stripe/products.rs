//! Product and price operations.

use async_trait::async_trait;
use diecast_core::catalog::{Product, meta};
use tracing::{debug, instrument};

use super::conversions::convert_product;
use super::types::{List, NewPrice, ProductUpdate, SearchPage, StripePrice, StripeProduct};
use super::{StripeClient, StripeError, escape_search_value};
use crate::catalog::CatalogSource;

/// Page size for product listing (Stripe's maximum).
pub const PAGE_SIZE: u32 = 100;

/// Filter for listing products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveFilter {
    /// Active and archived products.
    #[default]
    All,
    Active,
    Archived,
}

impl StripeClient {
    /// Fetch one page of products with `default_price` expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products_page(
        &self,
        active: ActiveFilter,
        starting_after: Option<&str>,
        limit: u32,
    ) -> Result<List<StripeProduct>, StripeError> {
        let mut query = vec![
            ("limit".to_string(), limit.clamp(1, PAGE_SIZE).to_string()),
            ("expand[]".to_string(), "data.default_price".to_string()),
        ];
        match active {
            ActiveFilter::All => {}
            ActiveFilter::Active => query.push(("active".to_string(), "true".to_string())),
            ActiveFilter::Archived => query.push(("active".to_string(), "false".to_string())),
        }
        if let Some(cursor) = starting_after {
            query.push(("starting_after".to_string(), cursor.to_string()));
        }
        self.get("products", &query).await
    }

    /// Fetch every product, following `has_more` cursors.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    #[instrument(skip(self))]
    pub async fn list_all_products(
        &self,
        active: ActiveFilter,
    ) -> Result<Vec<StripeProduct>, StripeError> {
        let mut products = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .list_products_page(active, cursor.as_deref(), PAGE_SIZE)
                .await?;
            cursor = page.data.last().map(|p| p.id.clone());
            let has_more = page.has_more;
            products.extend(page.data);
            if !has_more || cursor.is_none() {
                break;
            }
        }
        debug!(count = products.len(), "Listed Stripe products");
        Ok(products)
    }

    /// Run a Stripe search query (`active:'true' AND name~'porsche'`).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search_products(
        &self,
        query: &str,
        page: Option<&str>,
    ) -> Result<SearchPage<StripeProduct>, StripeError> {
        let mut params = vec![
            ("query".to_string(), query.to_string()),
            ("limit".to_string(), PAGE_SIZE.to_string()),
            ("expand[]".to_string(), "data.default_price".to_string()),
        ];
        if let Some(page) = page {
            params.push(("page".to_string(), page.to_string()));
        }
        self.get("products/search", &params).await
    }

    /// Fetch a product by id.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> Result<StripeProduct, StripeError> {
        self.get(
            &format!("products/{}", urlencoding::encode(id)),
            &[("expand[]".to_string(), "default_price".to_string())],
        )
        .await
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: &str,
        update: &ProductUpdate,
    ) -> Result<StripeProduct, StripeError> {
        self.post(
            &format!("products/{}", urlencoding::encode(id)),
            &update.to_form(),
        )
        .await
    }

    /// Create a one-off price.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_price(&self, price: &NewPrice) -> Result<StripePrice, StripeError> {
        self.post("prices", &price.to_form()).await
    }

    /// Archive a price so it can no longer be used for new purchases.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn deactivate_price(&self, id: &str) -> Result<StripePrice, StripeError> {
        self.post(
            &format!("prices/{}", urlencoding::encode(id)),
            &[("active".to_string(), "false".to_string())],
        )
        .await
    }
}

#[async_trait]
impl CatalogSource for StripeClient {
    async fn list_products(&self) -> Result<Vec<Product>, StripeError> {
        let products = self.list_all_products(ActiveFilter::Active).await?;
        Ok(products.into_iter().map(convert_product).collect())
    }

    async fn ping(&self) -> Result<(), StripeError> {
        self.list_products_page(ActiveFilter::Active, None, 1)
            .await
            .map(|_| ())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StripeError> {
        // Slugs written by the CLI are searchable; derived ones are not.
        let query = format!(
            "active:'true' AND metadata['{}']:'{}'",
            meta::SLUG,
            escape_search_value(slug)
        );
        let found = self.search_products(&query, None).await?;
        if let Some(product) = found
            .data
            .into_iter()
            .map(convert_product)
            .find(|p| p.slug == slug)
        {
            return Ok(Some(product));
        }

        Ok(self
            .list_products()
            .await?
            .into_iter()
            .find(|p| p.slug == slug))
    }
}
