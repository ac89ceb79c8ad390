//! Core types for the diecast storefront.
//!
//! Type-safe wrappers for identifiers, prices and emails.

pub mod email;
pub mod id;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, UnsupportedCurrency};
