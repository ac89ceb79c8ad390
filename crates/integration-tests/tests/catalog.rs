//! Catalog routes: listings, filters, product pages and the read cache.

use axum::http::StatusCode;
use diecast_integration_tests::TestApp;
use serde_json::Value;

fn names(body: &Value) -> Vec<String> {
    body["products"]
        .as_array()
        .unwrap_or_else(|| panic!("no products in {body}"))
        .iter()
        .map(|p| p["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_product_listing_featured_order() {
    let app = TestApp::new();

    let resp = app.get("/products").await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["count"], 6);
    assert_eq!(body["sort"], "featured");
    assert_eq!(body["products"][0]["slug"], "autoart-1-18-lamborghini-countach-lp400-1974");
    assert_eq!(body["products"][0]["price_display"], "$219.99");
    assert_eq!(body["products"][0]["brand"], "AUTOart");
    assert_eq!(body["products"][0]["scale"], "1:18");
}

#[tokio::test]
async fn test_price_bucket_excludes_out_of_range() {
    let app = TestApp::new();

    let body = app.get("/products?price=25-100&sort=price-asc").await.json();
    assert_eq!(
        names(&body),
        ["Bburago 1:24 Ferrari F40 1987", "Jada 1:24 Kenworth W900 Truck"]
    );
    assert_eq!(body["sort"], "price-asc");
}

#[tokio::test]
async fn test_combined_filters() {
    let app = TestApp::new();

    let body = app.get("/products?scale=1:24&year=1960s").await.json();
    assert_eq!(names(&body), ["Maisto 1:24 Volkswagen Beetle 1967"]);

    let body = app.get("/products?availability=pre-order").await.json();
    assert_eq!(names(&body), ["Kyosho 1:18 Porsche 911 Pre-Order"]);
}

#[tokio::test]
async fn test_invalid_filter_is_bad_request() {
    let app = TestApp::new();

    let resp = app.get("/products?price=cheap").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["error"].is_string());
}

#[tokio::test]
async fn test_product_detail_and_not_found() {
    let app = TestApp::new();

    let resp = app.get("/products/bburago-1-24-ferrari-f40-1987").await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], "prod_f40");
    assert_eq!(body["year"], 1987);
    assert_eq!(body["images"][0], "https://files.stripe.com/prod_f40.jpg");

    let resp = app.get("/products/no-such-car").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_listing() {
    let app = TestApp::new();

    let body = app.get("/category/trucks").await.json();
    assert_eq!(body["category"], "trucks");
    assert_eq!(names(&body), ["Jada 1:24 Kenworth W900 Truck"]);

    // Known but empty.
    let resp = app.get("/category/motorcycles").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["count"], 0);

    let resp = app.get("/category/spaceships").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_path_is_normalized() {
    let app = TestApp::new();

    let body = app.get("/category/Trucks").await.json();
    assert_eq!(body["category"], "trucks");
    assert_eq!(names(&body), ["Jada 1:24 Kenworth W900 Truck"]);

    let resp = app.get("/category/Vans%20Buses").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["category"], "vans-buses");
}

#[tokio::test]
async fn test_search() {
    let app = TestApp::new();

    let body = app.get("/search?q=ferrari").await.json();
    assert_eq!(body["query"], "ferrari");
    assert_eq!(names(&body), ["Bburago 1:24 Ferrari F40 1987"]);

    let body = app.get("/search?q=1:24&sort=name-desc").await.json();
    assert_eq!(body["count"], 3);
    assert_eq!(names(&body)[0], "Maisto 1:24 Volkswagen Beetle 1967");

    let body = app.get("/search?q=%20%20").await.json();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_catalog_is_served_from_cache() {
    let app = TestApp::new();

    app.get("/products").await;
    app.get("/products?sort=price-desc").await;
    app.get("/category/cars").await;
    app.get("/search?q=porsche").await;
    app.get("/products/tomica-1-64-nissan-skyline-gt-r").await;
    assert_eq!(app.catalog.list_calls(), 1);

    // Upstream changes stay invisible until the cache is invalidated.
    app.catalog.rename("prod_skyline", "Tomica 1:64 Nissan Skyline R34");
    let body = app.get("/products?brand=tomica").await.json();
    assert_eq!(names(&body), ["Tomica 1:64 Nissan Skyline GT-R"]);

    app.state.catalog().invalidate_all();
    let body = app.get("/products?brand=tomica").await.json();
    assert_eq!(names(&body), ["Tomica 1:64 Nissan Skyline R34"]);
    assert_eq!(app.catalog.list_calls(), 2);
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();

    let resp = app.get("/api/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");

    let resp = app.get("/api/health/ready").await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_sees_outage_behind_warm_cache() {
    let app = TestApp::new();
    assert_eq!(app.get("/products").await.status, StatusCode::OK);

    app.catalog.set_unreachable(true);
    let resp = app.get("/api/health/ready").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.json()["status"], "unavailable");

    // Shoppers are still served from the cache.
    assert_eq!(app.get("/products").await.status, StatusCode::OK);

    app.catalog.set_unreachable(false);
    assert_eq!(app.get("/api/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_debug_endpoints_follow_config() {
    let app = TestApp::new();
    let resp = app.get("/api/debug/config").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(!resp.json().to_string().contains("sk_test_"));

    let mut config = diecast_integration_tests::test_config();
    config.debug_endpoints = false;
    let app = TestApp::with_config(config);
    assert_eq!(app.get("/api/debug/config").await.status, StatusCode::NOT_FOUND);
}
