//! Stripe REST object shapes and request builders.
//!
//! Only the fields the storefront and CLI read are modelled; everything else
//! in Stripe's payloads is ignored by serde.

use std::collections::BTreeMap;

use diecast_core::{CartId, CurrencyCode, PriceId};
use serde::{Deserialize, Serialize};

/// A page of a Stripe list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// A page of a Stripe search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Stripe `product` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub default_price: Option<ExpandablePrice>,
    pub created: i64,
}

impl StripeProduct {
    /// Id of the default price, expanded or not.
    #[must_use]
    pub fn default_price_id(&self) -> Option<&str> {
        self.default_price.as_ref().map(ExpandablePrice::id)
    }
}

/// A price reference that may or may not have been expanded.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpandablePrice {
    Id(String),
    Object(Box<StripePrice>),
}

impl ExpandablePrice {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(price) => &price.id,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&StripePrice> {
        match self {
            Self::Id(_) => None,
            Self::Object(price) => Some(price),
        }
    }
}

/// Stripe `price` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    pub currency: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
}

/// Stripe `checkout.session` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// `open`, `complete` or `expired`.
    #[serde(default)]
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub created: i64,
}

/// Customer details collected during checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Metadata key holding the storefront cart id on checkout sessions.
pub const CART_ID_METADATA_KEY: &str = "cart_id";

impl CheckoutSession {
    /// Whether payment has been collected.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid" | "no_payment_required")
        )
    }

    /// Whether the session reached `complete`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }

    /// The storefront cart this session was created for.
    #[must_use]
    pub fn cart_id(&self) -> Option<CartId> {
        self.metadata
            .get(CART_ID_METADATA_KEY)
            .and_then(|id| id.parse().ok())
    }

    /// Email from the session, preferring what the customer entered.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }
}

/// Error body returned by Stripe on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Partial product update. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole image list.
    pub images: Option<Vec<String>>,
    /// Metadata keys to set.
    pub metadata: BTreeMap<String, String>,
    /// Metadata keys to delete.
    pub unset_metadata: Vec<String>,
    pub default_price: Option<PriceId>,
    pub active: Option<bool>,
}

impl ProductUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.images.is_none()
            && self.metadata.is_empty()
            && self.unset_metadata.is_empty()
            && self.default_price.is_none()
            && self.active.is_none()
    }

    /// Encode as Stripe form parameters.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = Vec::new();
        if let Some(name) = &self.name {
            form.push(("name".to_string(), name.clone()));
        }
        if let Some(description) = &self.description {
            form.push(("description".to_string(), description.clone()));
        }
        if let Some(images) = &self.images {
            if images.is_empty() {
                // An empty string clears the list.
                form.push(("images".to_string(), String::new()));
            }
            for (i, url) in images.iter().enumerate() {
                form.push((format!("images[{i}]"), url.clone()));
            }
        }
        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        for key in &self.unset_metadata {
            form.push((format!("metadata[{key}]"), String::new()));
        }
        if let Some(price) = &self.default_price {
            form.push(("default_price".to_string(), price.to_string()));
        }
        if let Some(active) = self.active {
            form.push(("active".to_string(), active.to_string()));
        }
        form
    }
}

/// A new one-off price for a product.
#[derive(Debug, Clone)]
pub struct NewPrice {
    pub product_id: String,
    pub unit_amount: i64,
    pub currency: CurrencyCode,
    pub nickname: Option<String>,
}

impl NewPrice {
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("product".to_string(), self.product_id.clone()),
            ("unit_amount".to_string(), self.unit_amount.to_string()),
            ("currency".to_string(), self.currency.as_stripe().to_string()),
        ];
        if let Some(nickname) = &self.nickname {
            form.push(("nickname".to_string(), nickname.clone()));
        }
        form
    }
}

/// One checkout line: a Stripe price and a quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub price_id: PriceId,
    pub quantity: u32,
}

/// Parameters for a hosted Checkout Session in `payment` mode.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub cart_id: CartId,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
}

impl CheckoutRequest {
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("client_reference_id".to_string(), self.cart_id.to_string()),
            (
                format!("metadata[{CART_ID_METADATA_KEY}]"),
                self.cart_id.to_string(),
            ),
        ];
        for (i, line) in self.lines.iter().enumerate() {
            form.push((format!("line_items[{i}][price]"), line.price_id.to_string()));
            form.push((
                format!("line_items[{i}][quantity]"),
                line.quantity.to_string(),
            ));
        }
        if let Some(email) = &self.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }
        form
    }
}
