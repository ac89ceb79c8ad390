//! Checkout route handlers.
//!
//! Payment happens on Stripe-hosted Checkout. The storefront creates a
//! Checkout Session from the cart, sends the visitor to Stripe, and clears
//! the cart once the session is paid (here on the success page, and again
//! from the webhook in case the visitor never comes back).

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diecast_core::CartId;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use super::cart::{CartView, current_cart};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::state::AppState;
use crate::stripe::{CheckoutLine, CheckoutRequest};

/// Where the client goes when checkout cannot start.
pub const CANCEL_PATH: &str = "/checkout/cancel";

/// Success URL; Stripe substitutes the session id.
const SUCCESS_PATH: &str = "/checkout/success?session_id={CHECKOUT_SESSION_ID}";

/// Checkout summary.
#[derive(Debug, Serialize)]
pub struct CheckoutSummary {
    pub cart: CartView,
    pub email: Option<String>,
}

/// Summary of the cart about to be paid for.
#[instrument(skip(state, session, user))]
pub async fn summary(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CheckoutSummary>> {
    let cart = current_cart(&state, &session)
        .await?
        .filter(|cart| !cart.is_empty())
        .ok_or_else(|| AppError::BadRequest("Your cart is empty".to_string()))?;

    Ok(Json(CheckoutSummary {
        cart: CartView::from(&cart),
        email: user.map(|u| u.email.into_inner()),
    }))
}

/// A created Checkout Session.
#[derive(Debug, Serialize)]
pub struct CheckoutSessionCreated {
    pub id: String,
    pub url: Option<String>,
}

/// Create a Stripe Checkout Session for the cart.
///
/// Stripe failures are logged with the raw message; the client only gets a
/// generic message and the cancellation path.
#[instrument(skip(state, session, user))]
pub async fn create_session(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Response> {
    let cart = current_cart(&state, &session)
        .await?
        .filter(|cart| !cart.is_empty())
        .ok_or_else(|| AppError::BadRequest("Your cart is empty".to_string()))?;

    let request = CheckoutRequest {
        cart_id: cart.id,
        lines: cart
            .items
            .iter()
            .map(|item| CheckoutLine {
                price_id: item.price_id.clone(),
                quantity: item.quantity,
            })
            .collect(),
        success_url: state.config().url_for(SUCCESS_PATH),
        cancel_url: state.config().url_for(CANCEL_PATH),
        customer_email: user.map(|u| u.email.into_inner()),
    };

    match state.checkout().create_checkout_session(&request).await {
        Ok(created) => {
            add_breadcrumb("checkout", "Checkout session created", None);
            tracing::info!(cart_id = %cart.id, session_id = %created.id, "Checkout session created");
            Ok(Json(CheckoutSessionCreated {
                id: created.id,
                url: created.url,
            })
            .into_response())
        }
        Err(e) => {
            tracing::error!(cart_id = %cart.id, error = %e, "Failed to create checkout session");
            sentry::capture_error(&e);
            Ok((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "Unable to start checkout. Please try again.",
                    "cancel_url": CANCEL_PATH,
                })),
            )
                .into_response())
        }
    }
}

/// Success page query.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Result of a completed checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResult {
    pub session_id: String,
    pub paid: bool,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub email: Option<String>,
}

/// Landing page after Stripe Checkout.
///
/// Clears the visitor's cart once paid, but only when the checkout was made
/// from that cart. Other carts are left to the webhook.
#[instrument(skip(state, session))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<CheckoutResult>> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing session_id".to_string()))?;

    let checkout = state
        .checkout()
        .retrieve_checkout_session(&session_id)
        .await?;
    let paid = checkout.is_paid();

    let own_cart = session.get::<CartId>(session_keys::CART_ID).await?;
    match (paid, checkout.cart_id(), own_cart) {
        (true, Some(paid_cart), Some(own_cart)) if paid_cart == own_cart => {
            state.carts().remove(own_cart).await;
            session.remove::<CartId>(session_keys::CART_ID).await?;
            tracing::info!(session_id = %checkout.id, cart_id = %own_cart, "Checkout completed, cart cleared");
        }
        (true, _, _) => {
            tracing::debug!(session_id = %checkout.id, "Paid checkout is not for this visitor's cart");
        }
        (false, _, _) => {}
    }

    Ok(Json(CheckoutResult {
        paid,
        amount_total: checkout.amount_total,
        currency: checkout.currency.clone(),
        email: checkout.email().map(str::to_owned),
        session_id: checkout.id,
    }))
}

/// Checkout was cancelled on Stripe; the cart is untouched.
pub async fn cancel() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "cancelled",
        "message": "Checkout was cancelled. Your cart has been saved.",
        "cart_url": "/cart",
    }))
}
