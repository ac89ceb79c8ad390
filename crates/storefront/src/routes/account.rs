//! Account route handlers (signed-in users only).
//!
//! Orders are the visitor's completed Stripe Checkout Sessions; nothing is
//! stored locally.

use axum::{Json, extract::State};
use diecast_core::{CurrencyCode, Price};
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::state::AppState;
use crate::stripe::CheckoutSession;

/// Current user's profile.
#[instrument(skip_all)]
pub async fn profile(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

/// One past order.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total: Option<Price>,
    pub total_display: Option<String>,
    pub payment_status: Option<String>,
}

impl From<&CheckoutSession> for OrderView {
    fn from(session: &CheckoutSession) -> Self {
        let total = session.amount_total.and_then(|cents| {
            session
                .currency
                .as_deref()
                .and_then(|c| c.parse::<CurrencyCode>().ok())
                .map(|currency| Price::from_cents(cents, currency))
        });
        Self {
            id: session.id.clone(),
            created_at: chrono::DateTime::from_timestamp(session.created, 0),
            total,
            total_display: total.map(|t| t.display()),
            payment_status: session.payment_status.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderView>,
    pub count: usize,
}

/// Completed checkouts for the signed-in user's email, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrdersResponse>> {
    let sessions = state
        .checkout()
        .list_checkout_sessions(user.email.as_str())
        .await?;
    let orders: Vec<OrderView> = sessions
        .iter()
        .filter(|s| s.is_complete() && s.is_paid())
        .map(OrderView::from)
        .collect();

    Ok(Json(OrdersResponse {
        count: orders.len(),
        orders,
    }))
}
