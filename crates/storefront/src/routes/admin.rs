//! Admin route handlers.
//!
//! Restricted to users on the `ADMIN_EMAILS` allow-list.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::catalog::PerformanceSnapshot;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub cache: CacheStatus,
    pub carts: u64,
    pub performance: PerformanceSnapshot,
}

async fn cache_status(state: &AppState) -> CacheStatus {
    CacheStatus {
        entries: state.catalog().entry_count().await,
        ttl_secs: state.catalog().ttl().as_secs(),
    }
}

/// Cache and performance overview.
#[instrument(skip_all, fields(user_id = %admin.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Json<AdminDashboard> {
    Json(AdminDashboard {
        cache: cache_status(&state).await,
        carts: state.carts().len().await,
        performance: state.catalog().monitor().snapshot(),
    })
}

/// Drop every cached catalog entry.
#[instrument(skip_all, fields(user_id = %admin.id))]
pub async fn clear_cache(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Json<CacheStatus> {
    state.catalog().invalidate_all();
    tracing::info!(user_id = %admin.id, "Catalog cache cleared by admin");
    Json(cache_status(&state).await)
}
