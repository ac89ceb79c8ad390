//! Authentication middleware and extractors.
//!
//! The session refresh middleware places a [`CurrentUser`] in request
//! extensions for signed-in visitors. The extractors here read it; the
//! protected-paths middleware turns anonymous requests for account pages
//! into a redirect to the login page.

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::models::CurrentUser;
use crate::state::AppState;

/// Path prefixes that require a signed-in user.
pub const PROTECTED_PREFIXES: [&str; 3] = ["/orders", "/profile", "/admin"];

/// Login page path.
pub const LOGIN_PATH: &str = "/login";

/// Whether `path` is a protected prefix itself or lies beneath one.
///
/// Matching is segment-aware: `/orders/123` is protected, `/ordersummary` is not.
#[must_use]
pub fn is_protected_path(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// `/login?from=<percent-encoded path>`.
#[must_use]
pub fn login_redirect_target(from: &str) -> String {
    format!("{LOGIN_PATH}?from={}", urlencoding::encode(from))
}

/// Redirect anonymous requests for protected paths to the login page.
pub async fn protected_paths_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if is_protected_path(path) && request.extensions().get::<CurrentUser>().is_none() {
        tracing::debug!(path, "Redirecting anonymous request to login");
        return Redirect::to(&login_redirect_target(path)).into_response();
    }
    next.run(request).await
}

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but the user is not logged in.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for page requests).
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but not allowed.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(from) => Redirect::to(&login_redirect_target(&from)).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({ "error": "Sign in required" })),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({ "error": "Forbidden" })),
            )
                .into_response(),
        }
    }
}

fn missing_user(parts: &Parts) -> AuthRejection {
    let path = parts.uri.path();
    if path.starts_with("/api/") {
        AuthRejection::Unauthorized
    } else {
        AuthRejection::RedirectToLogin(path.to_string())
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| missing_user(parts))
    }
}

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// Extractor that requires a user on the `ADMIN_EMAILS` allow-list.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if state.config().is_admin(&user.email) {
            Ok(Self(user))
        } else {
            tracing::warn!(user_id = %user.id, "Non-admin user denied admin access");
            Err(AuthRejection::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_protected_path() {
        for path in ["/orders", "/orders/", "/orders/cs_123", "/profile", "/admin/cache/clear"] {
            assert!(is_protected_path(path), "{path}");
        }
        for path in ["/", "/ordersummary", "/products/admin-car", "/login", "/profiles"] {
            assert!(!is_protected_path(path), "{path}");
        }
    }

    #[test]
    fn test_login_redirect_target_encodes_path() {
        assert_eq!(login_redirect_target("/orders"), "/login?from=%2Forders");
        assert_eq!(
            login_redirect_target("/admin/cache"),
            "/login?from=%2Fadmin%2Fcache"
        );
    }
}
