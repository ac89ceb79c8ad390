//! Cart route handlers.
//!
//! Carts live in the server-side [`CartStore`](crate::carts::CartStore); the
//! session only remembers the cart id. A cart is created on the first
//! add-to-cart.

use axum::{Json, extract::State};
use diecast_core::{Cart, CartError, CartId, CartItem, Price, ProductId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session_keys;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One cart line as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
    pub line_total_display: String,
}

impl From<&CartItem> for CartLineView {
    fn from(item: &CartItem) -> Self {
        let line_total = Price::from_cents(item.line_total_cents(), item.unit_price.currency);
        Self {
            product_id: item.product_id.to_string(),
            name: item.name.clone(),
            slug: item.slug.clone(),
            image: item.image.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total,
            line_total_display: line_total.display(),
        }
    }
}

/// Cart contents with totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Price,
    pub subtotal_display: String,
}

impl CartView {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(&Cart::new())
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let subtotal = cart.total();
        Self {
            items: cart.items.iter().map(CartLineView::from).collect(),
            item_count: cart.item_count(),
            subtotal,
            subtotal_display: subtotal.display(),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// The cart referenced by the session, if it still exists.
pub(crate) async fn current_cart(state: &AppState, session: &Session) -> Result<Option<Cart>> {
    let Some(id) = session.get::<CartId>(session_keys::CART_ID).await? else {
        return Ok(None);
    };
    Ok(state.carts().get(id).await)
}

/// Persist the cart and point the session at it.
async fn save_cart(state: &AppState, session: &Session, cart: Cart) -> Result<()> {
    session.insert(session_keys::CART_ID, cart.id).await?;
    state.carts().save(cart).await;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Current cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    Ok(Json(
        current_cart(&state, &session)
            .await?
            .map_or_else(CartView::empty, |cart| CartView::from(&cart)),
    ))
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub slug: String,
    pub quantity: Option<u32>,
}

/// Add a product to the cart, creating the cart if needed.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let product = state
        .catalog()
        .product_by_slug(&body.slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", body.slug)))?;

    let item = CartItem::from_product(&product, body.quantity.unwrap_or(1))?;
    let mut cart = current_cart(&state, &session)
        .await?
        .unwrap_or_else(Cart::new);
    cart.add(item)?;

    add_breadcrumb("cart", "Added to cart", Some(&[("slug", body.slug.as_str())]));
    tracing::info!(cart_id = %cart.id, product_id = %product.id, "Added to cart");

    let view = CartView::from(&cart);
    save_cart(&state, &session, cart).await?;
    Ok(Json(view))
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: String,
    pub quantity: u32,
}

/// Set a line's quantity. Zero removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let product_id = ProductId::new(body.product_id);
    let mut cart = current_cart(&state, &session)
        .await?
        .ok_or_else(|| CartError::NotInCart(product_id.clone()))?;
    cart.set_quantity(&product_id, body.quantity)?;

    let view = CartView::from(&cart);
    save_cart(&state, &session, cart).await?;
    Ok(Json(view))
}

/// Line removal request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: String,
}

/// Remove a line from the cart.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let product_id = ProductId::new(body.product_id);
    let mut cart = current_cart(&state, &session)
        .await?
        .ok_or_else(|| CartError::NotInCart(product_id.clone()))?;
    cart.remove(&product_id)?;

    let view = CartView::from(&cart);
    save_cart(&state, &session, cart).await?;
    Ok(Json(view))
}
