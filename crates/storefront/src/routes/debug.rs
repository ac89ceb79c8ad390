//! Debug endpoints, mounted only when `STOREFRONT_DEBUG_ENDPOINTS` is on.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::error::Result;
use crate::routes::products::ProductSummary;
use crate::state::AppState;

/// Raw view of the cached catalog plus cache statistics.
pub async fn catalog(State(state): State<AppState>) -> Result<Json<Value>> {
    let products = state.catalog().all().await?;
    let summaries: Vec<ProductSummary> = products.iter().map(ProductSummary::from).collect();
    Ok(Json(json!({
        "count": summaries.len(),
        "cache_entries": state.catalog().entry_count().await,
        "performance": state.catalog().monitor().snapshot(),
        "products": summaries,
    })))
}

/// Effective configuration with secrets redacted.
pub async fn config(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();
    Json(json!({
        "environment": config.environment.as_str(),
        "base_url": config.base_url,
        "stripe_api_base": config.stripe.api_base,
        "stripe_api_version": config.stripe.api_version,
        "stripe_webhooks": config.stripe.webhook_secret.is_some(),
        "supabase_url": config.supabase.url,
        "catalog_cache_ttl_secs": config.catalog.cache_ttl.as_secs(),
        "catalog_slow_call_ms": u64::try_from(config.catalog.slow_call_threshold.as_millis()).unwrap_or(u64::MAX),
        "rate_limit": {
            "enabled": config.rate_limit.enabled,
            "per_second": config.rate_limit.per_second,
            "burst": config.rate_limit.burst,
        },
        "admin_count": config.admin_emails.len(),
        "sentry": config.sentry_dsn.is_some(),
    }))
}
