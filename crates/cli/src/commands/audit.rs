//! Read-only catalog health report.
//!
//! Lists active products missing images, an active default price, a
//! category or an explicit slug, and groups of products whose names collide
//! once normalized. Run `categorize`, `slugs` or `dedupe` to fix them.

use std::collections::BTreeMap;

use diecast_core::catalog::{meta, normalize_name};
use diecast_storefront::stripe::{ActiveFilter, StripeClient, StripeProduct};
use tracing::{info, warn};

use super::CommandError;
use crate::batch::BatchRunner;

/// Findings for one audit run.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub total: usize,
    pub missing_images: Vec<String>,
    pub missing_price: Vec<String>,
    pub missing_category: Vec<String>,
    pub missing_slug: Vec<String>,
    /// Normalized name -> product ids sharing it.
    pub duplicates: BTreeMap<String, Vec<String>>,
}

impl AuditReport {
    /// Whether the catalog has no findings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_images.is_empty()
            && self.missing_price.is_empty()
            && self.missing_category.is_empty()
            && self.missing_slug.is_empty()
            && self.duplicates.is_empty()
    }
}

fn has_meta(product: &StripeProduct, key: &str) -> bool {
    product
        .metadata
        .get(key)
        .is_some_and(|v| !v.trim().is_empty())
}

fn has_active_price(product: &StripeProduct) -> bool {
    product
        .default_price
        .as_ref()
        .and_then(|p| p.as_object())
        .is_some_and(|p| p.active && p.unit_amount.is_some())
}

/// Build the report from a list of active products.
#[must_use]
pub fn audit(products: &[StripeProduct]) -> AuditReport {
    let mut report = AuditReport {
        total: products.len(),
        ..AuditReport::default()
    };
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for product in products {
        let label = format!("{} ({})", product.name, product.id);
        if product.images.is_empty() {
            report.missing_images.push(label.clone());
        }
        if !has_active_price(product) {
            report.missing_price.push(label.clone());
        }
        if !has_meta(product, meta::CATEGORY) {
            report.missing_category.push(label.clone());
        }
        if !has_meta(product, meta::SLUG) {
            report.missing_slug.push(label);
        }
        by_name
            .entry(normalize_name(&product.name))
            .or_default()
            .push(product.id.clone());
    }

    report.duplicates = by_name
        .into_iter()
        .filter(|(name, ids)| !name.is_empty() && ids.len() > 1)
        .collect();
    report
}

fn log_section(title: &str, items: &[String]) {
    if items.is_empty() {
        info!("{title}: none");
        return;
    }
    warn!("{title}: {}", items.len());
    for item in items {
        warn!("  - {item}");
    }
}

/// Fetch active products and log the report.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub async fn run(runner: &BatchRunner, client: &StripeClient) -> Result<AuditReport, CommandError> {
    let products = runner.fetch_catalog(client, ActiveFilter::Active).await?;
    let report = audit(&products);

    info!(total = report.total, "Audited active products");
    log_section("Missing images", &report.missing_images);
    log_section("Missing price", &report.missing_price);
    log_section("Missing category", &report.missing_category);
    log_section("Missing slug", &report.missing_slug);

    if report.duplicates.is_empty() {
        info!("Duplicate names: none");
    } else {
        warn!("Duplicate names: {}", report.duplicates.len());
        for (name, ids) in &report.duplicates {
            warn!("  - \"{name}\": {}", ids.join(", "));
        }
    }

    if report.is_clean() {
        info!("Catalog is clean");
    }
    Ok(report)
}
