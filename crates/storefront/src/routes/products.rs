//! Product route handlers.
//!
//! Listings read the cached catalog, then apply the query-string filters and
//! sort order in memory.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use diecast_core::Price;
use diecast_core::catalog::attributes::CATEGORIES;
use diecast_core::catalog::filter::{FilterParams, filter_products, sort_products};
use diecast_core::catalog::{Product, meta, slugify};
use serde::Serialize;
use tracing::instrument;

use crate::catalog::CatalogQuery;
use crate::error::{AppError, Result};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Product card data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub price: Option<Price>,
    pub price_display: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub scale: Option<String>,
    pub year: Option<u16>,
    pub category: String,
    pub availability: &'static str,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.price,
            price_display: product.price.map(|p| p.display()),
            image: product.primary_image().map(str::to_owned),
            brand: product.brand(),
            scale: product.scale().map(|s| s.to_string()),
            year: product.year(),
            category: product.category(),
            availability: product.availability().as_str(),
        }
    }
}

/// Product page data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub sku: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl From<&Product> for ProductDetail {
    fn from(product: &Product) -> Self {
        Self {
            summary: ProductSummary::from(product),
            description: product.description.clone(),
            images: product.images.clone(),
            sku: product.meta(meta::SKU).map(str::to_owned),
            metadata: product.metadata.clone(),
        }
    }
}

/// A filtered, sorted product listing.
#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductSummary>,
    pub count: usize,
    pub sort: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Apply query-string filters and sort to a base listing.
fn filtered_listing(base: &[Product], params: &FilterParams) -> Result<ProductList> {
    let (filter, sort) = params.parse()?;
    let products = sort_products(filter_products(base, &filter), sort);
    Ok(ProductList {
        count: products.len(),
        products: products.iter().map(ProductSummary::from).collect(),
        sort: sort.as_str(),
        category: None,
        query: None,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Product listing.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<ProductList>> {
    let products = state.catalog().all().await?;
    Ok(Json(filtered_listing(&products, &params)?))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    let product = state
        .catalog()
        .product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;
    Ok(Json(ProductDetail::from(product.as_ref())))
}

/// Products in one category.
///
/// The path is normalized first, so `/category/Vans%20Buses` is
/// `vans-buses`. Unknown categories with no products are a 404; a known
/// category that is currently empty is an empty listing.
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<FilterParams>,
) -> Result<Json<ProductList>> {
    let slug = slugify(&slug);
    let products = state.catalog().list(&CatalogQuery::category(&slug)).await?;
    if products.is_empty() && !CATEGORIES.contains(&slug.as_str()) {
        return Err(AppError::NotFound(format!("category {slug}")));
    }

    let mut listing = filtered_listing(&products, &params)?;
    listing.category = Some(slug);
    Ok(Json(listing))
}

/// Free-text search. A blank query returns no results.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<ProductList>> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_owned);

    let Some(query) = query else {
        // Still validate the rest of the query string.
        let (_, sort) = params.parse()?;
        return Ok(Json(ProductList {
            products: Vec::new(),
            count: 0,
            sort: sort.as_str(),
            category: None,
            query: None,
        }));
    };

    let products = state
        .catalog()
        .list(&CatalogQuery::search(&query))
        .await?;
    let mut listing = filtered_listing(&products, &params)?;
    listing.query = Some(query);
    Ok(Json(listing))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use diecast_core::catalog::slugify;
    use diecast_core::{CurrencyCode, PriceId, ProductId};

    use super::*;

    fn product(name: &str, cents: Option<i64>) -> Product {
        Product {
            id: ProductId::new(format!("prod_{}", slugify(name))),
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            price: cents.map(|c| Price::from_cents(c, CurrencyCode::USD)),
            price_id: cents.map(|_| PriceId::new("price_1")),
            images: vec!["https://files.stripe.com/a.jpg".to_string()],
            metadata: BTreeMap::from([(meta::SKU.to_string(), "AA-70201".to_string())]),
            active: true,
            created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_summary_derives_attributes() {
        let summary = ProductSummary::from(&product("AUTOart 1:18 Lamborghini Countach 1974", Some(21_999)));
        assert_eq!(summary.brand.as_deref(), Some("AUTOart"));
        assert_eq!(summary.scale.as_deref(), Some("1:18"));
        assert_eq!(summary.year, Some(1974));
        assert_eq!(summary.price_display.as_deref(), Some("$219.99"));
        assert_eq!(summary.availability, "in-stock");

        let detail = ProductDetail::from(&product("Maisto Beetle", None));
        assert_eq!(detail.sku.as_deref(), Some("AA-70201"));
        assert!(detail.summary.price.is_none());
    }

    #[test]
    fn test_filtered_listing_applies_bucket_and_sort() {
        let base = vec![
            product("Cheap Car", Some(5_000)),
            product("Mid Car", Some(9_900)),
            product("Upper Car", Some(14_999)),
            product("Pricey Car", Some(15_000)),
            product("Unpriced Car", None),
        ];
        let params = FilterParams {
            price: Some("75-150".to_string()),
            sort: Some("price-desc".to_string()),
            ..FilterParams::default()
        };
        let listing = filtered_listing(&base, &params).unwrap();
        let names: Vec<_> = listing.products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Upper Car", "Mid Car"]);
        assert_eq!(listing.sort, "price-desc");
    }

    #[test]
    fn test_filtered_listing_rejects_bad_values() {
        let params = FilterParams {
            year: Some("someday".to_string()),
            ..FilterParams::default()
        };
        assert!(matches!(
            filtered_listing(&[], &params),
            Err(AppError::Filter(_))
        ));
    }
}
