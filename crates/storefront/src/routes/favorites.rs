//! Favorites route handlers.
//!
//! Favorites are stored by the browser. The client posts its current list
//! with the slug to toggle and gets the new list back.

use axum::{Json, extract::State};
use diecast_core::{FavoriteProduct, Favorites};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Toggle request body.
///
/// `favorites` is either the stored JSON array or the raw local-storage
/// string; anything unreadable counts as an empty list.
#[derive(Debug, Deserialize)]
pub struct ToggleFavoriteRequest {
    #[serde(default)]
    pub favorites: Value,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleFavoriteResponse {
    pub favorites: Favorites,
    pub favorited: bool,
    pub count: usize,
}

/// Read the client's list, tolerating whatever local storage held.
fn parse_favorites(value: Value) -> Favorites {
    match value {
        Value::String(json) => Favorites::from_json(&json),
        Value::Array(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => Favorites::new(),
    }
}

/// Add or remove a product from the client's favorites.
#[instrument(skip(state, body), fields(slug = %body.slug))]
pub async fn toggle(
    State(state): State<AppState>,
    Json(body): Json<ToggleFavoriteRequest>,
) -> Result<Json<ToggleFavoriteResponse>> {
    let product = state
        .catalog()
        .product_by_slug(&body.slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", body.slug)))?;

    let mut favorites = parse_favorites(body.favorites);
    let favorited = favorites.toggle(FavoriteProduct::from_product(
        &product,
        chrono::Utc::now(),
    ));

    Ok(Json(ToggleFavoriteResponse {
        count: favorites.len(),
        favorites,
        favorited,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_favorites_shapes() {
        let entry = serde_json::json!({
            "id": "prod_1",
            "name": "Maisto 1:18 Ford GT",
            "slug": "maisto-1-18-ford-gt",
            "added_at": "2024-05-01T12:00:00Z"
        });

        assert_eq!(parse_favorites(Value::Array(vec![entry.clone()])).len(), 1);
        assert_eq!(
            parse_favorites(Value::String(Value::Array(vec![entry]).to_string())).len(),
            1
        );
        assert!(parse_favorites(Value::String("not json".to_string())).is_empty());
        assert!(parse_favorites(Value::Null).is_empty());
        assert!(parse_favorites(serde_json::json!([{"bogus": true}])).is_empty());
    }
}
