//! Maintenance commands.
//!
//! Each command builds a plan from the current catalog and hands it to the
//! shared [`BatchRunner`](crate::batch::BatchRunner); only `audit` is
//! read-only.

pub mod audit;
pub mod categorize;
pub mod dedupe;
pub mod images;
pub mod prices;
pub mod slugs;

use std::path::Path;

use diecast_core::catalog::{meta, slugify};
use diecast_storefront::config::{ConfigError, StripeConfig};
use diecast_storefront::stripe::{StripeClient, StripeError, StripeProduct};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::batch::BatchSummary;

/// Errors that stop a command before or after its batch.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Stripe settings missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog could not be loaded.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Mapping file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Mapping file is not valid YAML for this command.
    #[error("Invalid mapping file {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    /// Mapping file parsed but makes no sense.
    #[error("Invalid mapping: {0}")]
    Mapping(String),

    /// Some items failed to apply.
    #[error("{failed} of {planned} changes failed")]
    Failures { failed: usize, planned: usize },
}

impl CommandError {
    /// Turn a batch summary into an error when anything failed.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Failures` if any item failed.
    pub fn check(summary: BatchSummary) -> Result<BatchSummary, Self> {
        if summary.is_success() {
            Ok(summary)
        } else {
            Err(Self::Failures {
                failed: summary.failed,
                planned: summary.planned,
            })
        }
    }
}

/// Build a Stripe client from `STRIPE_*` environment variables.
///
/// # Errors
///
/// Returns an error if the secret key is missing or the client cannot be built.
pub fn stripe_client() -> Result<StripeClient, CommandError> {
    let config = StripeConfig::from_env()?;
    Ok(StripeClient::new(&config)?)
}

/// Read and parse a YAML mapping file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, CommandError> {
    let display = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: display.clone(),
            source,
        })?;
    serde_yaml::from_str(&content).map_err(|source| CommandError::Yaml {
        path: display,
        source,
    })
}

/// Storefront slug of a Stripe product: explicit metadata, else the name.
#[must_use]
pub fn product_slug(product: &StripeProduct) -> String {
    product
        .metadata
        .get(meta::SLUG)
        .map(|s| slugify(s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&product.name))
}

/// Whether a mapping pattern selects this product.
///
/// A pattern matches when it equals the product's slug (after slugifying) or
/// appears in the name, case-insensitively.
#[must_use]
pub fn pattern_matches(pattern: &str, product: &StripeProduct) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    slugify(pattern) == product_slug(product)
        || product
            .name
            .to_lowercase()
            .contains(&pattern.to_lowercase())
}

/// Reject mappings with blank patterns; they would match nothing.
///
/// # Errors
///
/// Returns `CommandError::Mapping` naming the first blank entry.
pub fn ensure_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<(), CommandError> {
    for (i, pattern) in patterns.into_iter().enumerate() {
        if pattern.trim().is_empty() {
            return Err(CommandError::Mapping(format!(
                "entry {} has an empty `match`",
                i + 1
            )));
        }
    }
    Ok(())
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_support::stripe_product;
    use super::*;

    #[test]
    fn test_pattern_matches_slug_or_name() {
        let mut product = stripe_product("prod_1", "AUTOart 1:18 Lamborghini Countach", &[], None, 0);
        assert!(pattern_matches("countach", &product));
        assert!(pattern_matches("COUNTACH", &product));
        assert!(pattern_matches("AUTOart 1:18 Lamborghini Countach", &product));
        assert!(!pattern_matches("miura", &product));
        assert!(!pattern_matches("   ", &product));

        product
            .metadata
            .insert(meta::SLUG.to_string(), "countach-lp400".to_string());
        assert!(pattern_matches("Countach LP400", &product));
    }

    #[test]
    fn test_ensure_patterns() {
        assert!(ensure_patterns(["a", "b"]).is_ok());
        let err = ensure_patterns(["a", " "]).unwrap_err();
        assert!(err.to_string().contains("entry 2"));
    }

    #[test]
    fn test_check_summary() {
        let ok = BatchSummary {
            planned: 2,
            succeeded: 2,
            failed: 0,
        };
        assert!(CommandError::check(ok).is_ok());

        let failed = BatchSummary {
            planned: 2,
            succeeded: 1,
            failed: 1,
        };
        assert!(matches!(
            CommandError::check(failed),
            Err(CommandError::Failures {
                failed: 1,
                planned: 2
            })
        ));
    }
}
