//! Favorites list.
//!
//! Favorites live in the browser's local storage as a JSON array of product
//! snapshots. The server only toggles entries in a list the client sends and
//! hands the new list back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{Price, ProductId};

/// Snapshot of a favorited product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub image: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl FavoriteProduct {
    /// Snapshot a catalog product now.
    #[must_use]
    pub fn from_product(product: &Product, added_at: DateTime<Utc>) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.price,
            image: product.primary_image().map(str::to_owned),
            added_at,
        }
    }
}

/// An ordered favorites list, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites(Vec<FavoriteProduct>);

impl Favorites {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Remove the product if present, otherwise insert the snapshot in
    /// `(added_at, id)` order.
    ///
    /// Returns `true` when the product is a favorite afterwards.
    pub fn toggle(&mut self, snapshot: FavoriteProduct) -> bool {
        if let Some(pos) = self.0.iter().position(|f| f.id == snapshot.id) {
            self.0.remove(pos);
            false
        } else {
            let key = (snapshot.added_at, &snapshot.id);
            let pos = self.0.partition_point(|f| (f.added_at, &f.id) < key);
            self.0.insert(pos, snapshot);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.0.iter().any(|f| &f.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FavoriteProduct> {
        self.0.iter()
    }

    /// Serialize to the local-storage format.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_owned())
    }

    /// Parse the local-storage format. Anything unreadable is an empty list,
    /// the same as a browser that never stored favorites.
    #[must_use]
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_default()
    }
}

impl From<Vec<FavoriteProduct>> for Favorites {
    fn from(items: Vec<FavoriteProduct>) -> Self {
        Self(items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::test_support::product;

    fn snapshot_at(id: &str, added_at: i64) -> FavoriteProduct {
        FavoriteProduct::from_product(
            &product(id, "Kyosho 1:18 Lancia Stratos", Some(15_900)),
            DateTime::from_timestamp(added_at, 0).unwrap(),
        )
    }

    fn snapshot(id: &str) -> FavoriteProduct {
        snapshot_at(id, 1_710_000_000)
    }

    #[test]
    fn test_toggle_absent_twice_restores_list() {
        let mut favorites = Favorites::from(vec![snapshot("a"), snapshot("b")]);
        let original = favorites.clone();

        assert!(favorites.toggle(snapshot("c")));
        assert!(favorites.contains(&ProductId::new("c")));
        assert!(!favorites.toggle(snapshot("c")));
        assert_eq!(favorites, original);
    }

    #[test]
    fn test_toggle_present_twice_restores_list() {
        let mut favorites = Favorites::from(vec![
            snapshot_at("a", 1_710_000_000),
            snapshot_at("b", 1_710_000_100),
            snapshot_at("c", 1_710_000_200),
        ]);
        let original = favorites.clone();

        for id in ["a", "b", "c"] {
            let existing = favorites
                .iter()
                .find(|f| f.id.as_str() == id)
                .cloned()
                .unwrap();
            assert!(!favorites.toggle(existing.clone()));
            assert!(!favorites.contains(&existing.id));
            assert!(favorites.toggle(existing));
            assert_eq!(favorites, original, "toggling {id}");
        }

        // Same timestamp: ties fall back to product id.
        let mut tied = Favorites::from(vec![snapshot("a"), snapshot("b"), snapshot("c")]);
        let original = tied.clone();
        assert!(!tied.toggle(snapshot("b")));
        assert!(tied.toggle(snapshot("b")));
        assert_eq!(tied, original);
    }

    #[test]
    fn test_new_favorites_go_last() {
        let mut favorites = Favorites::from(vec![snapshot_at("z", 1_710_000_000)]);
        favorites.toggle(snapshot_at("a", 1_710_000_500));
        let ids: Vec<_> = favorites.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["z", "a"]);
    }

    #[test]
    fn test_json_round_trip_and_malformed_input() {
        let mut favorites = Favorites::new();
        favorites.toggle(snapshot("x"));
        let json = favorites.to_json();
        assert!(json.starts_with('['));
        assert_eq!(Favorites::from_json(&json), favorites);

        assert!(Favorites::from_json("not json").is_empty());
        assert!(Favorites::from_json("{\"id\":1}").is_empty());
        assert!(Favorites::from_json("").is_empty());
    }

    #[test]
    fn test_snapshot_without_price_parses() {
        let json = r#"[{"id":"prod_1","name":"Jada Charger","slug":"jada-charger","added_at":"2024-03-09T16:00:00Z"}]"#;
        let favorites = Favorites::from_json(json);
        assert_eq!(favorites.len(), 1);
        assert!(favorites.iter().all(|f| f.price.is_none()));
    }
}
