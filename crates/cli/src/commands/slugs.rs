//! Write `metadata.slug` for every product.
//!
//! Slugs come from the product name. When two products share a slug, the
//! older one keeps it and the others get `-2`, `-3`, ... in creation order.

use std::collections::HashSet;

use diecast_core::catalog::{meta, slugify};
use diecast_storefront::stripe::{ActiveFilter, ProductUpdate, StripeClient, StripeProduct};

use super::CommandError;
use crate::batch::{Action, BatchRunner, BatchSummary, PlannedChange};

/// Fallback for names with no alphanumerics.
const EMPTY_SLUG: &str = "product";

/// Assign a unique slug to every product, oldest first.
///
/// Returns `(product id, slug)` pairs in creation order.
#[must_use]
pub fn assign_slugs(products: &[StripeProduct]) -> Vec<(String, String)> {
    let mut ordered: Vec<&StripeProduct> = products.iter().collect();
    ordered.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

    let mut taken: HashSet<String> = HashSet::with_capacity(ordered.len());
    ordered
        .into_iter()
        .map(|product| {
            let mut base = slugify(&product.name);
            if base.is_empty() {
                base = EMPTY_SLUG.to_string();
            }
            let mut slug = base.clone();
            let mut n = 2_u32;
            while taken.contains(&slug) {
                slug = format!("{base}-{n}");
                n += 1;
            }
            taken.insert(slug.clone());
            (product.id.clone(), slug)
        })
        .collect()
}

/// Plan slug updates for products whose metadata differs.
#[must_use]
pub fn plan(products: &[StripeProduct]) -> Vec<PlannedChange> {
    assign_slugs(products)
        .into_iter()
        .filter_map(|(id, slug)| {
            let product = products.iter().find(|p| p.id == id)?;
            let current = product.metadata.get(meta::SLUG).map(String::as_str);
            if current == Some(slug.as_str()) {
                return None;
            }
            Some(PlannedChange {
                product_id: id,
                product_name: product.name.clone(),
                description: format!("slug {} -> {slug}", current.unwrap_or("(none)")),
                action: Action::Update(ProductUpdate {
                    metadata: [(meta::SLUG.to_string(), slug)].into(),
                    ..ProductUpdate::default()
                }),
            })
        })
        .collect()
}

/// Plan and apply.
///
/// Archived products are included so a reactivated product keeps its slug.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or any update fails.
pub async fn run(runner: &BatchRunner, client: &StripeClient) -> Result<BatchSummary, CommandError> {
    let products = runner.fetch_catalog(client, ActiveFilter::All).await?;
    let changes = plan(&products);
    CommandError::check(runner.apply_to_stripe(client, changes).await)
}
