//! Server-side cart storage.
//!
//! Carts are kept in memory, keyed by [`CartId`]. The visitor's session only
//! holds the id. A cart untouched for 30 days is dropped.

use std::time::Duration;

use diecast_core::{Cart, CartId};
use moka::future::Cache;

/// Idle time after which an abandoned cart is dropped.
pub const CART_IDLE_EXPIRY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// In-memory cart store.
#[derive(Clone)]
pub struct CartStore {
    carts: Cache<CartId, Cart>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new(CART_IDLE_EXPIRY)
    }
}

impl CartStore {
    #[must_use]
    pub fn new(idle_expiry: Duration) -> Self {
        Self {
            carts: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle_expiry)
                .build(),
        }
    }

    pub async fn get(&self, id: CartId) -> Option<Cart> {
        self.carts.get(&id).await
    }

    /// Store the cart under its own id, replacing any previous version.
    pub async fn save(&self, cart: Cart) {
        self.carts.insert(cart.id, cart).await;
    }

    /// Drop a cart. Returns whether it existed.
    pub async fn remove(&self, id: CartId) -> bool {
        self.carts.remove(&id).await.is_some()
    }

    /// Number of live carts.
    pub async fn len(&self) -> u64 {
        self.carts.run_pending_tasks().await;
        self.carts.entry_count()
    }
}
