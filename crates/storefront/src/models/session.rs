//! Session-related types.
//!
//! Types stored in the session for authentication and cart state.

use serde::{Deserialize, Serialize};

use diecast_core::{Email, UserId};

use crate::supabase::AuthSession;

/// The signed-in user, as seen by handlers.
///
/// Placed in request extensions by the session refresh middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Auth provider user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Auth state kept in the session: the provider's token pair and the user.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredAuth {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp at which the access token expires.
    pub expires_at: i64,
    pub user: CurrentUser,
}

impl std::fmt::Debug for StoredAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredAuth")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl StoredAuth {
    /// Whether the access token expires within `leeway_secs` of `now`.
    #[must_use]
    pub const fn expires_within(&self, leeway_secs: i64, now: i64) -> bool {
        self.expires_at - now <= leeway_secs
    }
}

impl From<AuthSession> for StoredAuth {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
            user: CurrentUser {
                id: session.user.id,
                email: session.user.email,
            },
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for the stored auth state.
    pub const AUTH: &str = "auth";

    /// Key for the visitor's cart ID.
    pub const CART_ID: &str = "cart_id";
}
