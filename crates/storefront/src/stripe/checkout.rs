//! Hosted Checkout Session operations.

use async_trait::async_trait;
use tracing::instrument;

use super::types::{CheckoutRequest, CheckoutSession, List};
use super::{StripeClient, StripeError};

/// Payment provider seam used by the checkout and order routes.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a hosted checkout session for the cart.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError>;

    /// Look up a session by id.
    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeError>;

    /// Sessions created for the given customer email, newest first.
    async fn list_checkout_sessions(
        &self,
        customer_email: &str,
    ) -> Result<Vec<CheckoutSession>, StripeError>;
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, lines = request.lines.len()))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        self.post("checkout/sessions", &request.to_form()).await
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeError> {
        self.get(
            &format!("checkout/sessions/{}", urlencoding::encode(id)),
            &[],
        )
        .await
    }

    #[instrument(skip(self, customer_email))]
    async fn list_checkout_sessions(
        &self,
        customer_email: &str,
    ) -> Result<Vec<CheckoutSession>, StripeError> {
        let query = [
            (
                "customer_details[email]".to_string(),
                customer_email.to_string(),
            ),
            ("limit".to_string(), "100".to_string()),
        ];
        let list: List<CheckoutSession> = self.get("checkout/sessions", &query).await?;
        let mut sessions = list.data;
        sessions.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(sessions)
    }
}
