//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with in-memory store)
//! 5. Session refresh (refresh Supabase tokens, expose the current user)
//! 6. Security headers (CSP, HSTS, etc.)
//! 7. Rate limiting (governor, optional)
//! 8. Protected paths (redirect anonymous visitors to `/login`)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, is_protected_path, protected_paths_middleware,
};
pub use rate_limit::{RateLimiterLayer, rate_limiter};
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::{
    create_session_layer, session_refresh_middleware, set_stored_auth, stored_auth,
};
