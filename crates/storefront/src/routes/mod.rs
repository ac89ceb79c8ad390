//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Health
//! GET  /api/health                  - Liveness
//! GET  /api/health/ready            - Readiness (lists one product)
//!
//! # Catalog
//! GET  /products                    - Product listing (filter + sort)
//! GET  /products/{slug}             - Product detail
//! GET  /category/{slug}             - Category listing (filter + sort)
//! GET  /search?q=                   - Search (filter + sort)
//!
//! # Cart
//! GET  /cart                        - Current cart
//! POST /cart/add                    - {slug, quantity?}
//! POST /cart/update                 - {product_id, quantity}
//! POST /cart/remove                 - {product_id}
//!
//! # Checkout
//! GET  /checkout                    - Checkout summary
//! POST /api/checkout/create-session - Create Stripe Checkout Session
//! GET  /checkout/success            - Return from Stripe (clears cart when paid)
//! GET  /checkout/cancel             - Cancelled checkout
//! POST /api/webhooks/stripe         - Stripe events
//!
//! # Favorites
//! POST /api/favorites/toggle        - Toggle a product in the client's list
//!
//! # Auth
//! GET  /login                       - {from} hint
//! POST /login                       - Sign in
//! POST /logout                      - Sign out
//!
//! # Account (requires auth)
//! GET  /profile                     - Current user
//! GET  /orders                      - Completed checkouts
//!
//! # Admin (requires admin)
//! GET  /admin                       - Cache and performance overview
//! POST /admin/cache/clear           - Invalidate catalog cache
//!
//! # Debug (only when enabled)
//! GET  /api/debug/catalog
//! GET  /api/debug/config
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod debug;
pub mod favorites;
pub mod health;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the checkout page routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::summary))
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create the JSON API routes router.
///
/// Debug routes are only mounted when `debug_endpoints` is set; otherwise
/// they fall through to 404.
pub fn api_routes(debug_endpoints: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/checkout/create-session", post(checkout::create_session))
        .route("/webhooks/stripe", post(webhooks::stripe))
        .route("/favorites/toggle", post(favorites::toggle));

    if debug_endpoints {
        router.nest("/debug", debug_routes())
    } else {
        router
    }
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/cache/clear", post(admin::clear_cache))
}

/// Create the debug routes router.
pub fn debug_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(debug::catalog))
        .route("/config", get(debug::config))
}

/// Create all routes for the storefront.
pub fn routes(debug_endpoints: bool) -> Router<AppState> {
    Router::new()
        // Catalog
        .nest("/products", product_routes())
        .route("/category/{slug}", get(products::category))
        .route("/search", get(products::search))
        // Cart and checkout
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        // Auth
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        // Account
        .route("/profile", get(account::profile))
        .route("/orders", get(account::orders))
        // Admin
        .nest("/admin", admin_routes())
        // JSON API
        .nest("/api", api_routes(debug_endpoints))
}
