//! Diecast Storefront library.
//!
//! JSON storefront over a Stripe catalog with Supabase auth. Exposed as a
//! library so the router can be driven in-process by integration tests and
//! the Stripe client reused by the maintenance CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod carts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod supabase;

pub use app::build_app;
pub use state::AppState;
