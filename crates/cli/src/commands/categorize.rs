//! Write inferred attribute metadata to products.
//!
//! Category, brand, scale and year are inferred from the product name with
//! the same heuristics the storefront falls back to. Only missing keys are
//! written unless `--overwrite` is given.

use std::collections::BTreeMap;

use diecast_core::catalog::attributes::{extract_brand, extract_scale, extract_year, infer_category};
use diecast_core::catalog::meta;
use diecast_storefront::stripe::{ActiveFilter, ProductUpdate, StripeClient, StripeProduct};

use super::CommandError;
use crate::batch::{Action, BatchRunner, BatchSummary, PlannedChange};

/// Attribute metadata inferred from a product name.
#[must_use]
pub fn inferred_metadata(name: &str) -> BTreeMap<String, String> {
    let mut inferred = BTreeMap::from([(meta::CATEGORY.to_string(), infer_category(name).to_string())]);
    if let Some(brand) = extract_brand(name) {
        inferred.insert(meta::BRAND.to_string(), brand.to_string());
    }
    if let Some(scale) = extract_scale(name) {
        inferred.insert(meta::SCALE.to_string(), scale.to_string());
    }
    if let Some(year) = extract_year(name) {
        inferred.insert(meta::YEAR.to_string(), year.to_string());
    }
    inferred
}

/// Keys to write for one product.
fn metadata_changes(product: &StripeProduct, overwrite: bool) -> BTreeMap<String, String> {
    inferred_metadata(&product.name)
        .into_iter()
        .filter(|(key, value)| match product.metadata.get(key).map(|v| v.trim()) {
            None | Some("") => true,
            Some(current) => overwrite && current != value.as_str(),
        })
        .collect()
}

/// Plan metadata updates.
#[must_use]
pub fn plan(products: &[StripeProduct], overwrite: bool) -> Vec<PlannedChange> {
    products
        .iter()
        .filter_map(|product| {
            let metadata = metadata_changes(product, overwrite);
            if metadata.is_empty() {
                return None;
            }
            let description = metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            Some(PlannedChange {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                description,
                action: Action::Update(ProductUpdate {
                    metadata,
                    ..ProductUpdate::default()
                }),
            })
        })
        .collect()
}

/// Plan and apply.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or any update fails.
pub async fn run(
    runner: &BatchRunner,
    client: &StripeClient,
    overwrite: bool,
) -> Result<BatchSummary, CommandError> {
    let products = runner.fetch_catalog(client, ActiveFilter::Active).await?;
    let changes = plan(&products, overwrite);
    CommandError::check(runner.apply_to_stripe(client, changes).await)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::stripe_product;
    use super::*;

    #[test]
    fn test_inferred_metadata() {
        let inferred = inferred_metadata("AUTOart 1:18 Lamborghini Countach LP400 1974");
        assert_eq!(inferred.get(meta::BRAND).map(String::as_str), Some("AUTOart"));
        assert_eq!(inferred.get(meta::SCALE).map(String::as_str), Some("1:18"));
        assert_eq!(inferred.get(meta::YEAR).map(String::as_str), Some("1974"));
        assert!(inferred.contains_key(meta::CATEGORY));

        let sparse = inferred_metadata("Mystery Model");
        assert_eq!(sparse.len(), 1);
        assert!(sparse.contains_key(meta::CATEGORY));
    }

    #[test]
    fn test_only_missing_keys_without_overwrite() {
        let mut product = stripe_product("prod_1", "AUTOart 1:18 Lamborghini Countach", &[], None, 0);
        product
            .metadata
            .insert(meta::BRAND.to_string(), "Kyosho".to_string());
        product
            .metadata
            .insert(meta::SCALE.to_string(), String::new());

        let changes = metadata_changes(&product, false);
        assert!(!changes.contains_key(meta::BRAND));
        assert_eq!(changes.get(meta::SCALE).map(String::as_str), Some("1:18"));
        assert!(changes.contains_key(meta::CATEGORY));

        let changes = metadata_changes(&product, true);
        assert_eq!(changes.get(meta::BRAND).map(String::as_str), Some("AUTOart"));
    }

    #[test]
    fn test_plan_skips_up_to_date_products() {
        let mut product = stripe_product("prod_1", "Mystery Model", &[], None, 0);
        let category = inferred_metadata(&product.name)
            .remove(meta::CATEGORY)
            .unwrap_or_default();
        product.metadata.insert(meta::CATEGORY.to_string(), category);

        assert!(plan(&[product.clone()], false).is_empty());
        assert!(plan(&[product], true).is_empty());
    }
}
