//! Authentication route handlers.
//!
//! Sign-in goes through Supabase email/password auth; the token pair is kept
//! in the session and refreshed by the session middleware.

use axum::{
    Json,
    extract::{Query, State},
};
use diecast_core::Email;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{set_stored_auth, stored_auth};
use crate::models::{CurrentUser, StoredAuth, session_keys};
use crate::state::AppState;

/// Where to go after login when no safe `from` is given.
const DEFAULT_REDIRECT: &str = "/";

/// Accept only same-site absolute paths as post-login redirects.
///
/// Rejects scheme-relative (`//evil.test`) and backslash tricks that
/// browsers treat as another host.
#[must_use]
pub fn safe_redirect(from: Option<&str>) -> String {
    from.map(str::trim)
        .filter(|f| f.starts_with('/') && !f.starts_with("//") && !f.contains('\\'))
        .unwrap_or(DEFAULT_REDIRECT)
        .to_string()
}

/// Login page query.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub from: Option<String>,
}

/// Login page hint: where the visitor will land after signing in.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "from": safe_redirect(query.from.as_deref()) }))
}

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: CurrentUser,
    pub redirect: String,
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let email = Email::parse(&body.email).map_err(crate::supabase::AuthError::from)?;
    let password = SecretString::from(body.password);

    let auth = state.auth().sign_in_with_password(&email, &password).await?;
    let stored = StoredAuth::from(auth);
    let user = stored.user.clone();

    // New session id on privilege change; the cart id carries over.
    session.cycle_id().await?;
    set_stored_auth(&session, stored).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Signed in", None);
    tracing::info!(user_id = %user.id, "User signed in");

    Ok(Json(LoginResponse {
        user,
        redirect: safe_redirect(body.from.as_deref()),
    }))
}

/// Sign out and flush the session.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>> {
    if let Some(auth) = stored_auth(&session).await? {
        if let Err(e) = state.auth().sign_out(&auth.access_token).await {
            tracing::warn!(error = %e, "Supabase sign-out failed, clearing session anyway");
        }
        tracing::info!(user_id = %auth.user.id, "User signed out");
    }

    // Keep the cart across logout.
    let cart_id = session
        .get::<diecast_core::CartId>(session_keys::CART_ID)
        .await?;
    session.flush().await?;
    if let Some(cart_id) = cart_id {
        session.insert(session_keys::CART_ID, cart_id).await?;
    }

    clear_sentry_user();
    Ok(Json(serde_json::json!({ "status": "signed_out", "redirect": "/" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/orders")), "/orders");
        assert_eq!(safe_redirect(Some("/products/x?y=1")), "/products/x?y=1");
        assert_eq!(safe_redirect(Some("//evil.test")), "/");
        assert_eq!(safe_redirect(Some("/\\evil.test")), "/");
        assert_eq!(safe_redirect(Some("https://evil.test")), "/");
        assert_eq!(safe_redirect(Some("")), "/");
        assert_eq!(safe_redirect(None), "/");
    }
}
