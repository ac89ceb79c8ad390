//! Attach image URLs to products from a YAML mapping.
//!
//! ```yaml
//! - match: countach            # slug, or case-insensitive name substring
//!   images:
//!     - https://cdn.example.com/countach-front.jpg
//!     - https://cdn.example.com/countach-rear.jpg
//! ```
//!
//! By default the URLs are appended to the existing list; `--replace` swaps
//! the list out. The first matching entry wins for each product.

use std::path::Path;

use diecast_storefront::stripe::{ActiveFilter, ProductUpdate, StripeClient, StripeProduct};
use serde::Deserialize;
use tracing::{info, warn};

use super::{CommandError, ensure_patterns, load_yaml, pattern_matches};
use crate::batch::{Action, BatchRunner, BatchSummary, PlannedChange};

/// Stripe accepts at most eight images per product.
pub const MAX_IMAGES: usize = 8;

/// One mapping entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRule {
    #[serde(rename = "match")]
    pub pattern: String,
    pub images: Vec<String>,
}

/// New image list for `product`, or `None` when nothing would change.
fn merged_images(product: &StripeProduct, rule: &ImageRule, replace: bool) -> Option<Vec<String>> {
    let mut images: Vec<String> = if replace {
        Vec::new()
    } else {
        product.images.clone()
    };
    for url in rule.images.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        if !images.iter().any(|existing| existing == url) {
            images.push(url.to_string());
        }
    }
    if images.len() > MAX_IMAGES {
        warn!(
            product_id = %product.id,
            count = images.len(),
            "Too many images, keeping the first {MAX_IMAGES}"
        );
        images.truncate(MAX_IMAGES);
    }
    (images != product.images).then_some(images)
}

/// Plan image updates.
#[must_use]
pub fn plan(products: &[StripeProduct], rules: &[ImageRule], replace: bool) -> Vec<PlannedChange> {
    products
        .iter()
        .filter_map(|product| {
            let rule = rules.iter().find(|r| pattern_matches(&r.pattern, product))?;
            let images = merged_images(product, rule, replace)?;
            Some(PlannedChange {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                description: format!(
                    "{} images -> {} (match \"{}\")",
                    product.images.len(),
                    images.len(),
                    rule.pattern
                ),
                action: Action::Update(ProductUpdate {
                    images: Some(images),
                    ..ProductUpdate::default()
                }),
            })
        })
        .collect()
}

/// Load the mapping, plan and apply.
///
/// # Errors
///
/// Returns an error if the mapping is invalid, the catalog cannot be loaded,
/// or any update fails.
pub async fn run(
    runner: &BatchRunner,
    client: &StripeClient,
    mapping: &Path,
    replace: bool,
) -> Result<BatchSummary, CommandError> {
    let rules: Vec<ImageRule> = load_yaml(mapping).await?;
    ensure_patterns(rules.iter().map(|r| r.pattern.as_str()))?;
    info!(rules = rules.len(), replace, "Loaded image mapping");

    let products = runner.fetch_catalog(client, ActiveFilter::Active).await?;
    let changes = plan(&products, &rules, replace);
    CommandError::check(runner.apply_to_stripe(client, changes).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::stripe_product;
    use super::*;

    fn rule(pattern: &str, images: &[&str]) -> ImageRule {
        ImageRule {
            pattern: pattern.to_string(),
            images: images.iter().map(ToString::to_string).collect(),
        }
    }

    fn planned_images(change: &PlannedChange) -> &[String] {
        match &change.action {
            Action::Update(update) => update.images.as_deref().unwrap(),
            Action::Reprice { .. } => panic!("unexpected reprice"),
        }
    }

    #[test]
    fn test_mapping_parses() {
        let rules: Vec<ImageRule> =
            serde_yaml::from_str("- match: countach\n  images:\n    - https://a/1.jpg\n").unwrap();
        assert_eq!(rules[0].pattern, "countach");
        assert_eq!(rules[0].images, ["https://a/1.jpg"]);
    }

    #[test]
    fn test_append_skips_existing_urls() {
        let products = [stripe_product("prod_1", "Kyosho Countach", &["https://a/1.jpg"], None, 0)];
        let rules = [rule("countach", &["https://a/1.jpg", "https://a/2.jpg"])];

        let changes = plan(&products, &rules, false);
        assert_eq!(changes.len(), 1);
        assert_eq!(planned_images(&changes[0]), ["https://a/1.jpg", "https://a/2.jpg"]);
    }

    #[test]
    fn test_replace_and_unchanged() {
        let products = [
            stripe_product("prod_1", "Kyosho Countach", &["https://a/old.jpg"], None, 0),
            stripe_product("prod_2", "Kyosho Miura", &["https://a/m.jpg"], None, 0),
        ];
        let rules = [
            rule("countach", &["https://a/new.jpg"]),
            rule("miura", &["https://a/m.jpg"]),
        ];

        let changes = plan(&products, &rules, true);
        assert_eq!(changes.len(), 1, "miura already has exactly that list");
        assert_eq!(planned_images(&changes[0]), ["https://a/new.jpg"]);
    }

    #[test]
    fn test_caps_at_stripe_limit() {
        let urls: Vec<String> = (0..10).map(|i| format!("https://a/{i}.jpg")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let products = [stripe_product("prod_1", "Tomica Skyline", &[], None, 0)];

        let changes = plan(&products, &[rule("skyline", &refs)], false);
        assert_eq!(planned_images(&changes[0]).len(), MAX_IMAGES);
    }

    #[test]
    fn test_unmatched_products_skipped() {
        let products = [stripe_product("prod_1", "Tomica Skyline", &[], None, 0)];
        assert!(plan(&products, &[rule("countach", &["https://a/1.jpg"])], false).is_empty());
    }
}
