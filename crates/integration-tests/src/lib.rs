//! Integration tests for the Diecast storefront.
//!
//! The full router (every middleware layer included) is driven in-process
//! with `tower::ServiceExt::oneshot`. Stripe and Supabase are replaced by
//! the fakes below, so no network or credentials are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p diecast-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog` - Listings, filters, product pages, cache behavior
//! - `cart_checkout` - Cart flow and Stripe Checkout round trip
//! - `middleware` - Protected paths, security headers, rate limiting
//! - `auth` - Login, logout, profile, admin gate
//! - `favorites` - Favorites toggle
//! - `webhooks` - Signed Stripe events

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::{DateTime, Utc};
use diecast_core::catalog::{Product, slugify};
use diecast_core::{CurrencyCode, Email, Price, PriceId, ProductId, UserId};
use diecast_storefront::AppState;
use diecast_storefront::catalog::CatalogSource;
use diecast_storefront::config::{
    AppEnvironment, CatalogConfig, RateLimitConfig, StorefrontConfig, StripeConfig, SupabaseConfig,
};
use diecast_storefront::middleware::session::SESSION_COOKIE_NAME;
use diecast_storefront::stripe::{
    CART_ID_METADATA_KEY, CheckoutProvider, CheckoutRequest, CheckoutSession, StripeError,
};
use diecast_storefront::supabase::{AuthError, AuthProvider, AuthSession, AuthUser};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Webhook signing secret used by [`test_config`].
pub const WEBHOOK_SECRET: &str = "whsec_k3Jd8fQz1LmP0xVb7RtY2nWc";

/// Password the fake auth provider accepts.
pub const VALID_PASSWORD: &str = "correct horse battery staple";

/// Email on the admin allow-list.
pub const ADMIN_EMAIL: &str = "admin@diecast.test";

/// Email of an ordinary customer.
pub const CUSTOMER_EMAIL: &str = "collector@diecast.test";

// =============================================================================
// Fixtures
// =============================================================================

/// Build a catalog product.
#[must_use]
pub fn product(id: &str, name: &str, cents: Option<i64>, created: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        slug: slugify(name),
        description: None,
        price: cents.map(|c| Price::from_cents(c, CurrencyCode::USD)),
        price_id: cents.map(|_| PriceId::new(format!("price_{id}"))),
        images: vec![format!("https://files.stripe.com/{id}.jpg")],
        metadata: BTreeMap::new(),
        active: true,
        created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
    }
}

/// A small diecast catalog spanning brands, scales, prices and categories.
#[must_use]
pub fn sample_catalog() -> Vec<Product> {
    vec![
        product(
            "prod_countach",
            "AUTOart 1:18 Lamborghini Countach LP400 1974",
            Some(21_999),
            1_700_000_500,
        ),
        product("prod_f40", "Bburago 1:24 Ferrari F40 1987", Some(3_499), 1_700_000_400),
        product(
            "prod_beetle",
            "Maisto 1:24 Volkswagen Beetle 1967",
            Some(2_499),
            1_700_000_300,
        ),
        product("prod_skyline", "Tomica 1:64 Nissan Skyline GT-R", Some(899), 1_700_000_200),
        product(
            "prod_kenworth",
            "Jada 1:24 Kenworth W900 Truck",
            Some(9_999),
            1_700_000_100,
        ),
        product("prod_911", "Kyosho 1:18 Porsche 911 Pre-Order", None, 1_700_000_000),
    ]
}

// =============================================================================
// Fakes
// =============================================================================

/// In-memory catalog that counts upstream calls.
pub struct FakeCatalog {
    products: Mutex<Vec<Product>>,
    list_calls: AtomicUsize,
    unreachable: AtomicBool,
}

impl FakeCatalog {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Mutex::new(products),
            list_calls: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    /// How many times the full catalog was fetched.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Simulate a Stripe outage for listing calls.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Rename a product upstream (the cache does not know).
    pub fn rename(&self, id: &str, name: &str) {
        let mut products = self.products.lock().unwrap();
        if let Some(product) = products.iter_mut().find(|p| p.id.as_str() == id) {
            product.name = name.to_string();
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, StripeError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StripeError::RateLimited(30));
        }
        Ok(self.products.lock().unwrap().clone())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StripeError> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }
}

/// Checkout provider that completes every session it creates.
#[derive(Default)]
pub struct FakeCheckout {
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    fail: AtomicBool,
}

impl FakeCheckout {
    /// Make the next session creations fail like a Stripe outage.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of sessions created so far.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Seed a session as if it had been created earlier.
    pub fn insert(&self, session: CheckoutSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }
}

/// A completed, paid session for `email` with the given cart id.
#[must_use]
pub fn paid_session(id: &str, email: &str, cart_id: Option<String>, amount: i64) -> CheckoutSession {
    CheckoutSession {
        id: id.to_string(),
        url: None,
        status: Some("complete".to_string()),
        payment_status: Some("paid".to_string()),
        customer_email: Some(email.to_string()),
        customer_details: None,
        amount_total: Some(amount),
        currency: Some("usd".to_string()),
        metadata: cart_id
            .map(|id| BTreeMap::from([(CART_ID_METADATA_KEY.to_string(), id)]))
            .unwrap_or_default(),
        created: 1_700_000_000,
    }
}

#[async_trait]
impl CheckoutProvider for FakeCheckout {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StripeError::Api {
                status: 400,
                kind: "invalid_request_error".to_string(),
                message: "No such price: 'price_missing'".to_string(),
            });
        }
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let mut session = paid_session(
            &id,
            request.customer_email.as_deref().unwrap_or("guest@diecast.test"),
            Some(request.cart_id.to_string()),
            0,
        );
        session.url = Some(format!("https://checkout.stripe.com/c/pay/{id}"));
        self.insert(session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StripeError::NotFound(id.to_string()))
    }

    async fn list_checkout_sessions(
        &self,
        customer_email: &str,
    ) -> Result<Vec<CheckoutSession>, StripeError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.email() == Some(customer_email))
            .cloned()
            .collect())
    }
}

/// Auth provider accepting [`VALID_PASSWORD`] for any address.
///
/// Tokens normally live an hour. [`FakeAuth::set_short_lived`] issues tokens
/// that are already inside the refresh window, so the next request refreshes.
#[derive(Default)]
pub struct FakeAuth {
    users: Mutex<HashMap<String, UserId>>,
    refresh_tokens: Mutex<HashMap<String, Email>>,
    short_lived: AtomicBool,
    refresh_failing: AtomicBool,
    refreshes: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl FakeAuth {
    pub fn set_short_lived(&self, short_lived: bool) {
        self.short_lived.store(short_lived, Ordering::SeqCst);
    }

    pub fn set_refresh_failing(&self, failing: bool) {
        self.refresh_failing.store(failing, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn user(&self, email: &Email) -> AuthUser {
        let id = *self
            .users
            .lock()
            .unwrap()
            .entry(email.as_str().to_string())
            .or_insert_with(|| UserId::new(Uuid::new_v4()));
        AuthUser {
            id,
            email: email.clone(),
        }
    }

    fn issue(&self, email: &Email) -> AuthSession {
        let lifetime = if self.short_lived.load(Ordering::SeqCst) {
            30
        } else {
            3_600
        };
        let refresh_token = format!("refresh-{}", Uuid::new_v4());
        self.refresh_tokens
            .lock()
            .unwrap()
            .insert(refresh_token.clone(), email.clone());
        AuthSession {
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token,
            expires_at: Utc::now().timestamp() + lifetime,
            user: self.user(email),
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        if password.expose_secret() != VALID_PASSWORD {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.issue(email))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.refresh_failing.load(Ordering::SeqCst) {
            return Err(AuthError::SessionExpired);
        }
        // Refresh tokens are single use.
        let email = self
            .refresh_tokens
            .lock()
            .unwrap()
            .remove(refresh_token)
            .ok_or(AuthError::SessionExpired)?;
        Ok(self.issue(&email))
    }

    async fn get_user(&self, _access_token: &str) -> Result<AuthUser, AuthError> {
        Err(AuthError::SessionExpired)
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// App
// =============================================================================

/// Configuration for in-process tests: development mode, no rate limiting.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        environment: AppEnvironment::Development,
        debug_endpoints: true,
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_Xq81LmZp40RtVb9sKe2Nw7Hd"),
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
            api_base: "http://127.0.0.1:9".to_string(),
            api_version: None,
        },
        supabase: SupabaseConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: SecretString::from("anon-Jf83kLq0Pz5VwR2tXn7Bc"),
        },
        catalog: CatalogConfig {
            cache_ttl: Duration::from_secs(60),
            slow_call_threshold: Duration::from_millis(500),
        },
        rate_limit: RateLimitConfig::default(),
        admin_emails: vec![Email::parse(ADMIN_EMAIL).unwrap()],
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// The router plus handles on its fakes.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub catalog: Arc<FakeCatalog>,
    pub checkout: Arc<FakeCheckout>,
    pub auth: Arc<FakeAuth>,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    /// App over [`sample_catalog`] with [`test_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// App over [`sample_catalog`] with a custom configuration.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
        let checkout = Arc::new(FakeCheckout::default());
        let auth = Arc::new(FakeAuth::default());
        let state = AppState::new(
            config,
            Arc::clone(&catalog) as Arc<dyn CatalogSource>,
            Arc::clone(&checkout) as Arc<dyn CheckoutProvider>,
            Arc::clone(&auth) as Arc<dyn AuthProvider>,
        );
        Self {
            router: diecast_storefront::build_app(state.clone()),
            state,
            catalog,
            checkout,
            auth,
            cookie: Mutex::new(None),
        }
    }

    /// Send a request, carrying the session cookie like a browser would.
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = self.cookie.lock().unwrap().clone() {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        if let Some(update) = session_cookie(&headers) {
            *self.cookie.lock().unwrap() = update;
        }

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Sign in through `/login` and keep the session.
    pub async fn login(&self, email: &str) -> TestResponse {
        self.post_json(
            "/login",
            &serde_json::json!({ "email": email, "password": VALID_PASSWORD }),
        )
        .await
    }

    /// Forget the session cookie (a new browser).
    pub fn clear_cookies(&self) {
        *self.cookie.lock().unwrap() = None;
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// `Some(Some(cookie))` when the response sets the session cookie,
/// `Some(None)` when it removes it, `None` when it leaves it alone.
fn session_cookie(headers: &HeaderMap) -> Option<Option<String>> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(|v| {
            let pair = v.split(';').next().unwrap_or_default();
            let removed = pair.len() == prefix.len() || v.contains("Max-Age=0");
            (!removed).then(|| pair.to_string())
        })
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "body is not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    /// A header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Redirect target.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
    }
}
