//! Request pipeline: protected paths, security headers, request ids and
//! rate limiting.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use diecast_integration_tests::{CUSTOMER_EMAIL, TestApp, test_config};
use diecast_storefront::config::RateLimitConfig;

#[tokio::test]
async fn test_protected_paths_redirect_to_login() {
    let app = TestApp::new();

    for (path, location) in [
        ("/orders", "/login?from=%2Forders"),
        ("/profile", "/login?from=%2Fprofile"),
        ("/admin", "/login?from=%2Fadmin"),
        ("/admin/cache/clear", "/login?from=%2Fadmin%2Fcache%2Fclear"),
    ] {
        let resp = app.get(path).await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER, "{path}");
        assert_eq!(resp.location(), Some(location), "{path}");
    }
}

#[tokio::test]
async fn test_unprotected_paths_pass_through() {
    let app = TestApp::new();

    assert_eq!(app.get("/products").await.status, StatusCode::OK);
    // Looks like a protected prefix but is a different segment.
    assert_eq!(app.get("/ordersummary").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signed_in_users_reach_protected_paths() {
    let app = TestApp::new();
    app.login(CUSTOMER_EMAIL).await;

    let resp = app.get("/profile").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["email"], CUSTOMER_EMAIL);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new();

    for path in ["/products", "/no-such-page", "/orders"] {
        let resp = app.get(path).await;
        assert_eq!(resp.header("x-frame-options"), Some("DENY"), "{path}");
        assert_eq!(resp.header("x-content-type-options"), Some("nosniff"), "{path}");
        assert_eq!(resp.header("referrer-policy"), Some("no-referrer"), "{path}");
        let csp = resp.header("content-security-policy").unwrap_or_default();
        assert!(csp.contains("https://js.stripe.com"), "{path}: {csp}");
        assert!(resp.header("permissions-policy").is_some(), "{path}");
    }

    // Development over plain HTTP: no HSTS.
    assert!(
        app.get("/products")
            .await
            .header("strict-transport-security")
            .is_none()
    );
}

#[tokio::test]
async fn test_hsts_in_production() {
    let mut config = test_config();
    config.environment = diecast_storefront::config::AppEnvironment::Production;
    config.base_url = "https://shop.diecast.test".to_string();
    let app = TestApp::with_config(config);

    let resp = app.get("/products").await;
    assert!(
        resp.header("strict-transport-security")
            .is_some_and(|v| v.contains("max-age="))
    );
}

#[tokio::test]
async fn test_request_id_generated_or_propagated() {
    let app = TestApp::new();

    let resp = app.get("/api/health").await;
    let generated = resp.header("x-request-id").unwrap_or_default();
    assert!(!generated.is_empty());

    let resp = app
        .send(
            Request::get("/api/health")
                .header("x-request-id", "edge-42.abc")
                .body(Body::empty())
                .unwrap_or_default(),
        )
        .await;
    assert_eq!(resp.header("x-request-id"), Some("edge-42.abc"));
}

fn from_ip(path: &str, ip: &str) -> Request<Body> {
    Request::get(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_rate_limit_returns_429_per_client() {
    let mut config = test_config();
    config.rate_limit = RateLimitConfig {
        enabled: true,
        per_second: 60,
        burst: 2,
    };
    let app = TestApp::with_config(config);

    assert_eq!(app.send(from_ip("/products", "203.0.113.9")).await.status, StatusCode::OK);
    assert_eq!(app.send(from_ip("/products", "203.0.113.9")).await.status, StatusCode::OK);

    let limited = app.send(from_ip("/products", "203.0.113.9")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    // Headers still apply to rejected requests.
    assert_eq!(limited.header("x-frame-options"), Some("DENY"));

    // Another client has its own budget.
    assert_eq!(app.send(from_ip("/products", "198.51.100.4")).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_off_by_default() {
    let app = TestApp::new();
    for _ in 0..20 {
        assert_eq!(app.get("/api/health").await.status, StatusCode::OK);
    }
}
