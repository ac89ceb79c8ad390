//! Conversions from Stripe objects to catalog types.

use chrono::DateTime;
use diecast_core::catalog::{Product, meta, slugify};
use diecast_core::{CurrencyCode, Price, PriceId, ProductId};

use super::types::{StripePrice, StripeProduct};

/// Convert a Stripe price to a catalog price.
///
/// Prices without a unit amount (tiered/metered) or in a currency the shop
/// does not sell in are treated as unpriced.
pub fn convert_price(price: &StripePrice) -> Option<Price> {
    let cents = price.unit_amount?;
    match price.currency.parse::<CurrencyCode>() {
        Ok(currency) => Some(Price::from_cents(cents, currency)),
        Err(e) => {
            tracing::warn!(price_id = %price.id, error = %e, "Ignoring price");
            None
        }
    }
}

/// Convert a Stripe product (with `default_price` expanded) to a catalog product.
pub fn convert_product(product: StripeProduct) -> Product {
    let price = product
        .default_price
        .as_ref()
        .and_then(|p| p.as_object())
        .filter(|p| p.active)
        .and_then(convert_price);
    let price_id = product
        .default_price_id()
        .filter(|_| price.is_some())
        .map(PriceId::new);

    let slug = product
        .metadata
        .get(meta::SLUG)
        .map(String::as_str)
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&product.name));

    Product {
        id: ProductId::new(product.id),
        slug,
        description: product.description.filter(|d| !d.trim().is_empty()),
        price,
        price_id,
        images: product.images,
        metadata: product.metadata,
        active: product.active,
        created_at: DateTime::from_timestamp(product.created, 0).unwrap_or_default(),
        name: product.name,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stripe_product(json: serde_json::Value) -> StripeProduct {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_convert_product_with_price() {
        let product = convert_product(stripe_product(serde_json::json!({
            "id": "prod_1",
            "name": "AUTOart 1:18 Lamborghini Miura",
            "active": true,
            "created": 1_700_000_000,
            "default_price": {"id": "price_1", "active": true, "currency": "usd", "unit_amount": 18_900}
        })));
        assert_eq!(product.slug, "autoart-1-18-lamborghini-miura");
        assert_eq!(product.price_cents(), Some(18_900));
        assert_eq!(product.price_id.unwrap().as_str(), "price_1");
        assert_eq!(product.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_metadata_slug_wins() {
        let product = convert_product(stripe_product(serde_json::json!({
            "id": "prod_2", "name": "Whatever", "created": 0,
            "metadata": {"slug": "Miura SV"}
        })));
        assert_eq!(product.slug, "miura-sv");
        assert!(product.price.is_none());
    }

    #[test]
    fn test_unsupported_currency_and_inactive_price_are_unpriced() {
        let yen = convert_product(stripe_product(serde_json::json!({
            "id": "prod_3", "name": "Tomica Skyline", "created": 0,
            "default_price": {"id": "price_3", "active": true, "currency": "jpy", "unit_amount": 900}
        })));
        assert!(yen.price.is_none());
        assert!(yen.price_id.is_none());

        let archived = convert_product(stripe_product(serde_json::json!({
            "id": "prod_4", "name": "Norev 2CV", "created": 0,
            "default_price": {"id": "price_4", "active": false, "currency": "usd", "unit_amount": 900}
        })));
        assert!(archived.price.is_none());
    }
}
