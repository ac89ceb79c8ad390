//! Signed Stripe webhook deliveries.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use diecast_integration_tests::{TestApp, WEBHOOK_SECRET, test_config};
use diecast_storefront::stripe::CheckoutProvider;
use diecast_storefront::stripe::webhook::{SIGNATURE_HEADER, sign_payload};
use serde_json::{Value, json};

fn event(kind: &str, object: &Value) -> String {
    json!({
        "id": "evt_test_1",
        "type": kind,
        "created": chrono::Utc::now().timestamp(),
        "data": { "object": object },
    })
    .to_string()
}

fn delivery(payload: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder
        .body(Body::from(payload.to_string()))
        .unwrap_or_default()
}

fn signed(payload: &str) -> Request<Body> {
    let signature = sign_payload(payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
    delivery(payload, Some(signature))
}

#[tokio::test]
async fn test_rejects_unsigned_and_forged_deliveries() {
    let app = TestApp::new();
    let payload = event("product.updated", &json!({ "id": "prod_f40" }));

    let resp = app.send(delivery(&payload, None)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let forged = sign_payload(&payload, "whsec_someone_else", chrono::Utc::now().timestamp());
    let resp = app.send(delivery(&payload, Some(forged))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let stale = sign_payload(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp() - 3_600);
    let resp = app.send(delivery(&payload, Some(stale))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unconfigured_secret_is_unavailable() {
    let mut config = test_config();
    config.stripe.webhook_secret = None;
    let app = TestApp::with_config(config);

    let payload = event("product.updated", &json!({ "id": "prod_f40" }));
    let resp = app.send(signed(&payload)).await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_completed_checkout_clears_cart() {
    let app = TestApp::new();
    app.post_json(
        "/cart/add",
        &json!({ "slug": "bburago-1-24-ferrari-f40-1987" }),
    )
    .await;
    assert_eq!(app.state.carts().len().await, 1);

    // The visitor went to Stripe; the webhook arrives before they return.
    let created = app
        .post_json("/api/checkout/create-session", &json!({}))
        .await
        .json();
    let session_id = created["id"].as_str().unwrap_or_default();
    let session = app
        .state
        .checkout()
        .retrieve_checkout_session(session_id)
        .await
        .unwrap_or_else(|e| panic!("session missing: {e}"));

    let payload = event(
        "checkout.session.completed",
        &serde_json::to_value(&session).unwrap_or_default(),
    );
    let resp = app.send(signed(&payload)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["received"], true);

    assert_eq!(app.state.carts().len().await, 0);
    assert_eq!(app.get("/cart").await.json()["item_count"], 0);
}

#[tokio::test]
async fn test_unpaid_checkout_keeps_cart() {
    let app = TestApp::new();
    app.post_json(
        "/cart/add",
        &json!({ "slug": "bburago-1-24-ferrari-f40-1987" }),
    )
    .await;

    let created = app
        .post_json("/api/checkout/create-session", &json!({}))
        .await
        .json();
    let session_id = created["id"].as_str().unwrap_or_default();
    let mut session = app
        .state
        .checkout()
        .retrieve_checkout_session(session_id)
        .await
        .unwrap_or_else(|e| panic!("session missing: {e}"));
    session.payment_status = Some("unpaid".to_string());

    let payload = event(
        "checkout.session.completed",
        &serde_json::to_value(&session).unwrap_or_default(),
    );
    assert_eq!(app.send(signed(&payload)).await.status, StatusCode::OK);
    assert_eq!(app.state.carts().len().await, 1);
}

#[tokio::test]
async fn test_product_events_invalidate_catalog() {
    let app = TestApp::new();
    app.get("/products").await;
    app.get("/products").await;
    assert_eq!(app.catalog.list_calls(), 1);

    let payload = event("price.updated", &json!({ "id": "price_prod_f40" }));
    assert_eq!(app.send(signed(&payload)).await.status, StatusCode::OK);

    app.get("/products").await;
    assert_eq!(app.catalog.list_calls(), 2);

    // Unrelated events are acknowledged and ignored.
    let payload = event("customer.created", &json!({ "id": "cus_1" }));
    assert_eq!(app.send(signed(&payload)).await.status, StatusCode::OK);
    app.get("/products").await;
    assert_eq!(app.catalog.list_calls(), 2);
}
