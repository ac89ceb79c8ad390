//! Reprice products from a YAML mapping.
//!
//! ```yaml
//! - match: countach     # slug, or case-insensitive name substring
//!   unit_amount: 21999  # minor units (cents)
//!   currency: usd       # optional, defaults to usd
//! ```
//!
//! Stripe prices are immutable, so each change creates a new price, makes it
//! the product's default and then deactivates the previous default.

use std::path::Path;

use diecast_core::CurrencyCode;
use diecast_core::Price;
use diecast_storefront::stripe::{ActiveFilter, NewPrice, StripeClient, StripeProduct};
use serde::Deserialize;
use tracing::info;

use super::{CommandError, ensure_patterns, load_yaml, pattern_matches};
use crate::batch::{Action, BatchRunner, BatchSummary, PlannedChange};

/// One mapping entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRule {
    #[serde(rename = "match")]
    pub pattern: String,
    pub unit_amount: i64,
    #[serde(default)]
    pub currency: CurrencyCode,
}

/// Reject non-positive amounts before touching Stripe.
fn validate(rules: &[PriceRule]) -> Result<(), CommandError> {
    ensure_patterns(rules.iter().map(|r| r.pattern.as_str()))?;
    if let Some(rule) = rules.iter().find(|r| r.unit_amount <= 0) {
        return Err(CommandError::Mapping(format!(
            "\"{}\" has a non-positive unit_amount",
            rule.pattern
        )));
    }
    Ok(())
}

/// Whether the current default price already is `rule`'s price.
fn already_priced(product: &StripeProduct, rule: &PriceRule) -> bool {
    product
        .default_price
        .as_ref()
        .and_then(|p| p.as_object())
        .is_some_and(|p| {
            p.active
                && p.unit_amount == Some(rule.unit_amount)
                && p.currency.eq_ignore_ascii_case(rule.currency.as_stripe())
        })
}

fn current_price_label(product: &StripeProduct) -> String {
    product
        .default_price
        .as_ref()
        .and_then(|p| p.as_object())
        .and_then(|p| {
            let currency = p.currency.parse::<CurrencyCode>().ok()?;
            Some(Price::from_cents(p.unit_amount?, currency).display())
        })
        .unwrap_or_else(|| "unpriced".to_string())
}

/// Plan price changes.
#[must_use]
pub fn plan(products: &[StripeProduct], rules: &[PriceRule]) -> Vec<PlannedChange> {
    products
        .iter()
        .filter_map(|product| {
            let rule = rules.iter().find(|r| pattern_matches(&r.pattern, product))?;
            if already_priced(product, rule) {
                return None;
            }
            let new_price = Price::from_cents(rule.unit_amount, rule.currency);
            Some(PlannedChange {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                description: format!(
                    "{} -> {}",
                    current_price_label(product),
                    new_price.display()
                ),
                action: Action::Reprice {
                    price: NewPrice {
                        product_id: product.id.clone(),
                        unit_amount: rule.unit_amount,
                        currency: rule.currency,
                        nickname: None,
                    },
                    previous: product.default_price_id().map(str::to_owned),
                },
            })
        })
        .collect()
}

/// Load the mapping, plan and apply.
///
/// # Errors
///
/// Returns an error if the mapping is invalid, the catalog cannot be loaded,
/// or any repricing fails.
pub async fn run(
    runner: &BatchRunner,
    client: &StripeClient,
    mapping: &Path,
) -> Result<BatchSummary, CommandError> {
    let rules: Vec<PriceRule> = load_yaml(mapping).await?;
    validate(&rules)?;
    info!(rules = rules.len(), "Loaded price mapping");

    let products = runner.fetch_catalog(client, ActiveFilter::Active).await?;
    let changes = plan(&products, &rules);
    CommandError::check(runner.apply_to_stripe(client, changes).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::stripe_product;
    use super::*;

    fn rule(pattern: &str, unit_amount: i64) -> PriceRule {
        PriceRule {
            pattern: pattern.to_string(),
            unit_amount,
            currency: CurrencyCode::USD,
        }
    }

    #[test]
    fn test_mapping_defaults_currency() {
        let rules: Vec<PriceRule> =
            serde_yaml::from_str("- match: countach\n  unit_amount: 21999\n").unwrap();
        assert_eq!(rules[0].currency, CurrencyCode::USD);

        let rules: Vec<PriceRule> =
            serde_yaml::from_str("- match: f40\n  unit_amount: 500\n  currency: eur\n").unwrap();
        assert_eq!(rules[0].currency, CurrencyCode::EUR);
    }

    #[test]
    fn test_validate_rejects_bad_amounts() {
        assert!(validate(&[rule("countach", 100)]).is_ok());
        assert!(matches!(
            validate(&[rule("countach", 0)]),
            Err(CommandError::Mapping(_))
        ));
    }

    #[test]
    fn test_plan_reprices_and_remembers_previous() {
        let products = [
            stripe_product("prod_1", "Kyosho Countach", &[], Some(("price_old", 18_900)), 0),
            stripe_product("prod_2", "Kyosho Miura", &[], None, 0),
        ];
        let changes = plan(&products, &[rule("countach", 21_999), rule("miura", 9_900)]);
        assert_eq!(changes.len(), 2);

        assert_eq!(changes[0].description, "$189.00 -> $219.99");
        match &changes[0].action {
            Action::Reprice { price, previous } => {
                assert_eq!(price.product_id, "prod_1");
                assert_eq!(price.unit_amount, 21_999);
                assert_eq!(previous.as_deref(), Some("price_old"));
            }
            Action::Update(_) => panic!("expected reprice"),
        }

        assert_eq!(changes[1].description, "unpriced -> $99.00");
        assert!(matches!(
            &changes[1].action,
            Action::Reprice { previous: None, .. }
        ));
    }

    #[test]
    fn test_plan_skips_products_already_at_price() {
        let products = [stripe_product("prod_1", "Kyosho Countach", &[], Some(("price_1", 21_999)), 0)];
        assert!(plan(&products, &[rule("countach", 21_999)]).is_empty());
    }
}
