//! Diecast Core - shared domain types and catalog logic.
//!
//! Used by both the storefront server and the maintenance CLI:
//! - `storefront` - JSON API over the Stripe catalog and checkout
//! - `cli` - batch maintenance scripts against the Stripe catalog
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Filtering, sorting and cart arithmetic can therefore be tested
//! without any network fakes.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices and emails
//! - [`catalog`] - Products, attribute heuristics, filter and sort
//! - [`cart`] - Shopping cart with price snapshots
//! - [`favorites`] - Client-side favorites list

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod favorites;
pub mod types;

pub use cart::{Cart, CartError, CartItem};
pub use catalog::Product;
pub use favorites::{FavoriteProduct, Favorites};
pub use types::*;
