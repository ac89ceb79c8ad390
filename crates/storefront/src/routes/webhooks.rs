//! Stripe webhook endpoint.
//!
//! Deliveries are verified against `STRIPE_WEBHOOK_SECRET` before anything
//! is read from them. Handled events:
//!
//! - `checkout.session.completed`: drop the cart named in the session metadata
//! - `product.*` / `price.*`: invalidate the catalog cache

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stripe::webhook::{SIGNATURE_HEADER, construct_event};
use crate::stripe::{CheckoutSession, Event, WebhookError};

/// Receive a Stripe event.
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let Some(secret) = state.config().stripe.webhook_secret.as_ref() else {
        tracing::warn!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
        return Err(AppError::ServiceUnavailable(
            "Webhooks are not configured".to_string(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    let payload = std::str::from_utf8(&body)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let event = construct_event(payload, signature, secret.expose_secret())?;
    tracing::info!(event_id = %event.id, kind = %event.kind, "Stripe event received");

    handle_event(&state, &event).await?;
    Ok(Json(json!({ "received": true })))
}

async fn handle_event(state: &AppState, event: &Event) -> Result<()> {
    match event.kind.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
                .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
            if !session.is_paid() {
                tracing::debug!(session_id = %session.id, "Checkout completed without payment yet");
                return Ok(());
            }
            match session.cart_id() {
                Some(cart_id) => {
                    let removed = state.carts().remove(cart_id).await;
                    tracing::info!(session_id = %session.id, %cart_id, removed, "Cart cleared after checkout");
                }
                None => {
                    tracing::warn!(session_id = %session.id, "Completed checkout has no cart id");
                }
            }
        }
        kind if kind.starts_with("product.") || kind.starts_with("price.") => {
            state.catalog().invalidate_all();
        }
        kind => tracing::debug!(kind, "Ignoring Stripe event"),
    }
    Ok(())
}
