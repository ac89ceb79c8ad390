//! Shopping cart.
//!
//! A cart holds price snapshots taken when the item was added. Nothing keeps
//! it in sync with the live catalog; checkout re-reads prices through Stripe
//! price ids.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{CartId, CurrencyCode, Price, PriceId, ProductId};

/// Maximum quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("quantity {requested} exceeds the per-item limit of {max}")]
    QuantityTooLarge { requested: u32, max: u32 },
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
    #[error("product {0} has no price")]
    Unpriced(ProductId),
    #[error("cart is in {cart}, item is in {item}")]
    CurrencyMismatch {
        cart: &'static str,
        item: &'static str,
    },
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub quantity: u32,
    /// Price at the time the item was added.
    pub unit_price: Price,
    pub price_id: PriceId,
}

impl CartItem {
    /// Snapshot a catalog product as a cart line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Unpriced`] if the product has no default price.
    pub fn from_product(product: &Product, quantity: u32) -> Result<Self, CartError> {
        let (Some(unit_price), Some(price_id)) = (product.price, product.price_id.clone()) else {
            return Err(CartError::Unpriced(product.id.clone()));
        };
        Ok(Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            image: product.primary_image().map(str::to_owned),
            quantity,
            unit_price,
            price_id,
        })
    }

    /// `unit_price × quantity` in cents.
    #[must_use]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price.cents * i64::from(self.quantity)
    }
}

/// A visitor's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(CartId::generate())
    }

    /// An empty cart with a known id.
    #[must_use]
    pub const fn with_id(id: CartId) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    /// Add an item, merging with an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Fails on zero quantity, when the merged quantity would exceed
    /// [`MAX_LINE_QUANTITY`], or when the currency differs from the cart's.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        check_quantity(item.quantity)?;
        if let Some(currency) = self.currency()
            && currency != item.unit_price.currency
        {
            return Err(CartError::CurrencyMismatch {
                cart: currency.as_stripe(),
                item: item.unit_price.currency.as_stripe(),
            });
        }

        if let Some(line) = self.line_mut(&item.product_id) {
            let merged = line.quantity.saturating_add(item.quantity);
            check_quantity(merged)?;
            line.quantity = merged;
        } else {
            self.items.push(item);
        }
        Ok(())
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Fails when the product is not in the cart or the quantity is too large.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        check_quantity(quantity)?;
        let line = self
            .line_mut(product_id)
            .ok_or_else(|| CartError::NotInCart(product_id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if there is no such line.
    pub fn remove(&mut self, product_id: &ProductId) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|item| &item.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::NotInCart(product_id.clone()));
        }
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Currency of the cart, taken from the first line.
    #[must_use]
    pub fn currency(&self) -> Option<CurrencyCode> {
        self.items.first().map(|item| item.unit_price.currency)
    }

    /// Sum of line totals. An empty cart totals zero dollars.
    #[must_use]
    pub fn total(&self) -> Price {
        let cents = self.items.iter().map(CartItem::line_total_cents).sum();
        Price::from_cents(cents, self.currency().unwrap_or_default())
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

const fn check_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        Err(CartError::ZeroQuantity)
    } else if quantity > MAX_LINE_QUANTITY {
        Err(CartError::QuantityTooLarge {
            requested: quantity,
            max: MAX_LINE_QUANTITY,
        })
    } else {
        Ok(())
    }
}
