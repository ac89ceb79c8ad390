//! Archive duplicate products.
//!
//! Active products are grouped by normalized name. In each group one product
//! is kept: the one with the most images, then one with a price, then the
//! oldest. The rest are archived (`active=false`), never deleted.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use diecast_core::catalog::normalize_name;
use diecast_storefront::stripe::{ActiveFilter, ProductUpdate, StripeClient, StripeProduct};

use super::CommandError;
use crate::batch::{Action, BatchRunner, BatchSummary, PlannedChange};

/// A group of products sharing a normalized name.
#[derive(Debug)]
pub struct DuplicateGroup<'a> {
    pub name: String,
    pub keep: &'a StripeProduct,
    pub archive: Vec<&'a StripeProduct>,
}

/// Ranking key: more images, then priced, then older, then id for stability.
fn keeper_rank(product: &StripeProduct) -> (Reverse<usize>, Reverse<bool>, i64, &str) {
    (
        Reverse(product.images.len()),
        Reverse(product.default_price.is_some()),
        product.created,
        product.id.as_str(),
    )
}

/// Group active products with colliding names and pick a keeper in each.
#[must_use]
pub fn find_duplicates(products: &[StripeProduct]) -> Vec<DuplicateGroup<'_>> {
    let mut groups: BTreeMap<String, Vec<&StripeProduct>> = BTreeMap::new();
    for product in products.iter().filter(|p| p.active) {
        let name = normalize_name(&product.name);
        if !name.is_empty() {
            groups.entry(name).or_default().push(product);
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|(name, mut members)| {
            members.sort_by(|a, b| keeper_rank(a).cmp(&keeper_rank(b)));
            let mut members = members.into_iter();
            let keep = members.next()?;
            Some(DuplicateGroup {
                name,
                keep,
                archive: members.collect(),
            })
        })
        .collect()
}

/// Plan archive updates.
#[must_use]
pub fn plan(products: &[StripeProduct]) -> Vec<PlannedChange> {
    find_duplicates(products)
        .into_iter()
        .flat_map(|group| {
            let keep_id = group.keep.id.clone();
            group.archive.into_iter().map(move |product| PlannedChange {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                description: format!("archive, duplicate of {keep_id}"),
                action: Action::Update(ProductUpdate {
                    active: Some(false),
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
pub async fn run(runner: &BatchRunner, client: &StripeClient) -> Result<BatchSummary, CommandError> {
    let products = runner.fetch_catalog(client, ActiveFilter::Active).await?;
    let changes = plan(&products);
    CommandError::check(runner.apply_to_stripe(client, changes).await)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::stripe_product;
    use super::*;

    #[test]
    fn test_keeper_prefers_images_then_price_then_age() {
        let products = [
            stripe_product("prod_old", "Maisto Beetle", &[], None, 1),
            stripe_product("prod_priced", "maisto beetle", &[], Some(("price_1", 999)), 5),
            stripe_product("prod_imgs", "Maisto  Beetle!", &["https://a/1.jpg"], None, 9),
        ];
        let groups = find_duplicates(&products);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "maisto beetle");
        assert_eq!(groups[0].keep.id, "prod_imgs");
        let archived: Vec<_> = groups[0].archive.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(archived, ["prod_priced", "prod_old"]);

        let groups = find_duplicates(&products[..2]);
        assert_eq!(groups[0].keep.id, "prod_priced");
    }

    #[test]
    fn test_oldest_wins_ties() {
        let products = [
            stripe_product("prod_new", "Tomica GT-R", &[], None, 20),
            stripe_product("prod_old", "Tomica GT-R", &[], None, 10),
        ];
        let changes = plan(&products);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].product_id, "prod_new");
        assert_eq!(changes[0].description, "archive, duplicate of prod_old");
    }

    #[test]
    fn test_unique_and_archived_products_ignored() {
        let mut archived = stripe_product("prod_2", "Tomica GT-R", &[], None, 2);
        archived.active = false;
        let products = [
            stripe_product("prod_1", "Tomica GT-R", &[], None, 1),
            archived,
            stripe_product("prod_3", "Tomica Supra", &[], None, 3),
        ];
        assert!(plan(&products).is_empty());
    }
}
