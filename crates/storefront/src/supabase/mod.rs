//! Supabase (GoTrue) auth client.
//!
//! Accounts live in Supabase; the storefront only exchanges credentials for a
//! token pair, refreshes it, and asks who the token belongs to.
//!
//! # Endpoints
//!
//! - `POST /auth/v1/token?grant_type=password` - sign in
//! - `POST /auth/v1/token?grant_type=refresh_token` - refresh
//! - `GET  /auth/v1/user` - current user
//! - `POST /auth/v1/logout` - revoke the refresh token
//!
//! Every request carries the project's anon key in the `apikey` header.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diecast_core::{Email, UserId};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::config::SupabaseConfig;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Access or refresh token rejected.
    #[error("Session expired")]
    SessionExpired,

    /// Email failed validation.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] diecast_core::EmailError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Auth service answered with an unexpected error.
    #[error("Auth service error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Email,
}

/// A token pair plus the user it belongs to.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp at which the access token expires.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Auth provider seam used by the login routes and the session middleware.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange email and password for a session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError>;

    /// Exchange a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;

    /// Resolve the user an access token belongs to.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    /// Revoke the session server-side.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl ErrorResponse {
    fn message(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

impl UserResponse {
    fn into_user(self) -> Result<AuthUser, AuthError> {
        let email = self.email.ok_or_else(|| AuthError::Api {
            status: 200,
            message: "user has no email".to_string(),
        })?;
        Ok(AuthUser {
            id: UserId::new(self.id),
            email: Email::parse(&email)?,
        })
    }
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Result<AuthSession, AuthError> {
        Ok(AuthSession {
            expires_at: self.expires_at.unwrap_or(now + self.expires_in),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user.into_user()?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Supabase auth REST API.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    url: String,
    anon_key: SecretString,
}

impl SupabaseClient {
    /// Create a new auth client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SupabaseConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client,
                url: config.url.clone(),
                anon_key: config.anon_key.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.inner.url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, self.endpoint(path))
            .header("apikey", self.inner.anon_key.expose_secret())
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error: ErrorResponse = response.json().await.unwrap_or_default();
            return Err(map_token_error(status, &error));
        }

        let token: TokenResponse = response.json().await?;
        token.into_session(chrono::Utc::now().timestamp())
    }
}

/// Map a failed token grant to an `AuthError`.
fn map_token_error(status: StatusCode, error: &ErrorResponse) -> AuthError {
    let code = error
        .error_code
        .as_deref()
        .or(error.error.as_deref())
        .unwrap_or_default();
    match (status, code) {
        (StatusCode::BAD_REQUEST, "invalid_credentials" | "invalid_grant") => {
            AuthError::InvalidCredentials
        }
        (
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED,
            "refresh_token_not_found" | "refresh_token_already_used" | "session_not_found",
        )
        | (StatusCode::UNAUTHORIZED, _) => AuthError::SessionExpired,
        _ => {
            tracing::warn!(status = %status, message = %error.message(), "Supabase token grant failed");
            AuthError::Api {
                status: status.as_u16(),
                message: error.message(),
            }
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        self.token_grant(
            "password",
            serde_json::json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .request(reqwest::Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => response.json::<UserResponse>().await?.into_user(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::SessionExpired),
            status => {
                let error: ErrorResponse = response.json().await.unwrap_or_default();
                Err(AuthError::Api {
                    status: status.as_u16(),
                    message: error.message(),
                })
            }
        }
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .request(reqwest::Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        // An already-expired token has nothing left to revoke.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(AuthError::Api {
                status: status.as_u16(),
                message: format!("logout failed with HTTP {status}"),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_into_session() {
        let json = serde_json::json!({
            "access_token": "jwt-access",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r1",
            "user": {"id": "0b6a4f7e-3f3c-4c53-9d1b-1a2b3c4d5e6f", "email": "Collector@Example.COM"}
        });
        let token: TokenResponse = serde_json::from_value(json).unwrap();
        let session = token.into_session(1_000).unwrap();
        assert_eq!(session.expires_at, 4_600);
        assert_eq!(session.user.email.as_str(), "Collector@example.com");
    }

    #[test]
    fn test_explicit_expires_at_wins() {
        let json = serde_json::json!({
            "access_token": "a", "refresh_token": "r", "expires_in": 3600, "expires_at": 99,
            "user": {"id": "0b6a4f7e-3f3c-4c53-9d1b-1a2b3c4d5e6f", "email": "a@b.test"}
        });
        let token: TokenResponse = serde_json::from_value(json).unwrap();
        assert_eq!(token.into_session(0).unwrap().expires_at, 99);
    }

    #[test]
    fn test_map_token_error() {
        let bad_password = ErrorResponse {
            error_code: Some("invalid_credentials".into()),
            msg: Some("Invalid login credentials".into()),
            ..ErrorResponse::default()
        };
        assert!(matches!(
            map_token_error(StatusCode::BAD_REQUEST, &bad_password),
            AuthError::InvalidCredentials
        ));

        let legacy = ErrorResponse {
            error: Some("invalid_grant".into()),
            ..ErrorResponse::default()
        };
        assert!(matches!(
            map_token_error(StatusCode::BAD_REQUEST, &legacy),
            AuthError::InvalidCredentials
        ));

        let used = ErrorResponse {
            error_code: Some("refresh_token_already_used".into()),
            ..ErrorResponse::default()
        };
        assert!(matches!(
            map_token_error(StatusCode::BAD_REQUEST, &used),
            AuthError::SessionExpired
        ));

        assert!(matches!(
            map_token_error(StatusCode::INTERNAL_SERVER_ERROR, &ErrorResponse::default()),
            AuthError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = AuthSession {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            expires_at: 0,
            user: AuthUser {
                id: UserId::new(Uuid::nil()),
                email: Email::parse("a@b.test").unwrap(),
            },
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
