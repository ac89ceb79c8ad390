//! Session-scoped models for the storefront.

pub mod session;

pub use session::{CurrentUser, StoredAuth, keys as session_keys};
