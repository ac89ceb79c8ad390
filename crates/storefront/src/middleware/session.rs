//! Session layer and auth refresh.
//!
//! Sessions live in an in-memory `tower-sessions` store. They hold the
//! Supabase token pair and the visitor's cart id; a restart signs everyone
//! out and orphans carts, which is acceptable for a cache-only deployment.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::config::StorefrontConfig;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, StoredAuth, session_keys};
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "dc_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Refresh access tokens that expire within this many seconds.
pub const REFRESH_LEEWAY_SECS: i64 = 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Keep the Supabase session fresh and expose the current user.
///
/// When the stored access token is about to expire, it is exchanged for a new
/// pair. If the refresh fails the auth state is dropped and the request
/// continues anonymously. The user, if any, is inserted into request
/// extensions as [`CurrentUser`].
pub async fn session_refresh_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let stored = match session.get::<StoredAuth>(session_keys::AUTH).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read auth state from session");
            None
        }
    };

    let user = match stored {
        Some(auth) => refresh_if_needed(&state, &session, auth).await,
        None => None,
    };

    if let Some(user) = user {
        set_sentry_user(&user.id, Some(user.email.as_str()));
        request.extensions_mut().insert(user);
    } else {
        clear_sentry_user();
    }

    next.run(request).await
}

async fn refresh_if_needed(
    state: &AppState,
    session: &Session,
    auth: StoredAuth,
) -> Option<CurrentUser> {
    let now = chrono::Utc::now().timestamp();
    if !auth.expires_within(REFRESH_LEEWAY_SECS, now) {
        return Some(auth.user);
    }

    match state.auth().refresh_session(&auth.refresh_token).await {
        Ok(refreshed) => {
            let refreshed = StoredAuth::from(refreshed);
            let user = refreshed.user.clone();
            if let Err(e) = session.insert(session_keys::AUTH, refreshed).await {
                tracing::warn!(error = %e, "Failed to store refreshed auth state");
            }
            tracing::debug!(user_id = %user.id, "Refreshed auth session");
            Some(user)
        }
        Err(e) => {
            tracing::info!(error = %e, user_id = %auth.user.id, "Auth refresh failed, signing out");
            if let Err(e) = session.remove::<StoredAuth>(session_keys::AUTH).await {
                tracing::warn!(error = %e, "Failed to clear auth state");
            }
            None
        }
    }
}

/// Store auth state after sign-in.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_stored_auth(
    session: &Session,
    auth: StoredAuth,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::AUTH, auth).await
}

/// Read the stored auth state, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn stored_auth(
    session: &Session,
) -> Result<Option<StoredAuth>, tower_sessions::session::Error> {
    session.get(session_keys::AUTH).await
}
