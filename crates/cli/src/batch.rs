//! Shared batch runner for the maintenance commands.
//!
//! Every command follows the same shape:
//!
//! 1. Page through the Stripe catalog (100 per page, fixed delay between pages)
//! 2. Match products and build a list of [`PlannedChange`]s
//! 3. Log the plan, then wait `--confirm-delay` so the operator can Ctrl-C
//! 4. Apply changes one at a time with `--call-delay` between calls
//! 5. Log a summary
//!
//! A failed item is logged and counted; the run continues with the next one.
//! Nothing is persisted between runs, so re-running after a partial failure
//! re-applies the same matching from scratch.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use diecast_storefront::stripe::{
    ActiveFilter, NewPrice, PAGE_SIZE, ProductUpdate, StripeClient, StripeError, StripeProduct,
};
use tracing::{error, info, warn};

/// Timing and safety options shared by all commands.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Log the plan and stop.
    pub dry_run: bool,
    /// Pause between logging the plan and applying it.
    pub confirm_delay: Duration,
    /// Pause between API calls (and between catalog pages).
    pub call_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            confirm_delay: Duration::from_secs(5),
            call_delay: Duration::from_millis(250),
        }
    }
}

/// What to do to one product.
#[derive(Debug, Clone)]
pub enum Action {
    /// Partial product update.
    Update(ProductUpdate),
    /// Create a price, make it the default, then deactivate the old default.
    Reprice {
        price: NewPrice,
        previous: Option<String>,
    },
}

/// One planned change, with a human-readable description for the log.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub product_id: String,
    pub product_name: String,
    pub description: String,
    pub action: Action,
}

impl fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.product_name, self.product_id, self.description
        )
    }
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Whether every attempted item succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Drives the plan, confirm, apply cycle.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    options: BatchOptions,
}

impl BatchRunner {
    #[must_use]
    pub const fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Fetch every product matching `active`, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails; a partial catalog is never
    /// used for planning.
    pub async fn fetch_catalog(
        &self,
        client: &StripeClient,
        active: ActiveFilter,
    ) -> Result<Vec<StripeProduct>, StripeError> {
        let mut products = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_number = 0_usize;

        loop {
            if page_number > 0 {
                tokio::time::sleep(self.options.call_delay).await;
            }
            page_number += 1;

            let page = client
                .list_products_page(active, cursor.as_deref(), PAGE_SIZE)
                .await?;
            info!(page = page_number, count = page.data.len(), "Fetched catalog page");

            cursor = page.data.last().map(|p| p.id.clone());
            let has_more = page.has_more;
            products.extend(page.data);
            if !has_more || cursor.is_none() {
                break;
            }
        }

        info!(total = products.len(), "Catalog loaded");
        Ok(products)
    }

    /// Log the plan, wait, then apply each change with `apply`.
    ///
    /// In dry-run mode nothing is applied and the summary reports zero
    /// successes and failures.
    pub async fn run<F, Fut, E>(&self, plan: Vec<PlannedChange>, mut apply: F) -> BatchSummary
    where
        F: FnMut(PlannedChange) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let mut summary = BatchSummary {
            planned: plan.len(),
            ..BatchSummary::default()
        };

        if plan.is_empty() {
            info!("Nothing to do");
            return summary;
        }

        info!(changes = plan.len(), "Execution plan:");
        for (i, change) in plan.iter().enumerate() {
            info!("  [{}/{}] {change}", i + 1, plan.len());
        }

        if self.options.dry_run {
            info!("Dry run, no changes applied");
            return summary;
        }

        if !self.options.confirm_delay.is_zero() {
            warn!(
                seconds = self.options.confirm_delay.as_secs_f32(),
                "Applying changes shortly, press Ctrl-C to abort"
            );
            tokio::time::sleep(self.options.confirm_delay).await;
        }

        let total = plan.len();
        for (i, change) in plan.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.options.call_delay).await;
            }
            let label = change.to_string();
            match apply(change).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    info!("  [{}/{total}] done: {label}", i + 1);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("  [{}/{total}] FAILED: {label}: {e}", i + 1);
                }
            }
        }

        info!(
            planned = summary.planned,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch complete"
        );
        summary
    }

    /// Run the plan against Stripe.
    pub async fn apply_to_stripe(
        &self,
        client: &StripeClient,
        plan: Vec<PlannedChange>,
    ) -> BatchSummary {
        let call_delay = self.options.call_delay;
        self.run(plan, |change| apply_change(client, change, call_delay))
            .await
    }
}

/// Apply one change. Repricing makes up to three calls, spaced by `call_delay`.
async fn apply_change(
    client: &StripeClient,
    change: PlannedChange,
    call_delay: Duration,
) -> Result<(), StripeError> {
    match change.action {
        Action::Update(update) => {
            client.update_product(&change.product_id, &update).await?;
        }
        Action::Reprice { price, previous } => {
            let created = client.create_price(&price).await?;
            tokio::time::sleep(call_delay).await;

            let update = ProductUpdate {
                default_price: Some(created.id.clone().into()),
                ..ProductUpdate::default()
            };
            client.update_product(&change.product_id, &update).await?;

            if let Some(previous) = previous.filter(|id| *id != created.id) {
                tokio::time::sleep(call_delay).await;
                client.deactivate_price(&previous).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn change(id: &str) -> PlannedChange {
        PlannedChange {
            product_id: id.to_string(),
            product_name: format!("Product {id}"),
            description: "archive".to_string(),
            action: Action::Update(ProductUpdate {
                active: Some(false),
                ..ProductUpdate::default()
            }),
        }
    }

    fn fast(dry_run: bool) -> BatchRunner {
        BatchRunner::new(BatchOptions {
            dry_run,
            confirm_delay: Duration::ZERO,
            call_delay: Duration::ZERO,
        })
    }

    #[test]
    fn test_default_delays() {
        let options = BatchOptions::default();
        assert_eq!(options.confirm_delay, Duration::from_secs(5));
        assert_eq!(options.call_delay, Duration::from_millis(250));
        assert!(!options.dry_run);
    }

    #[tokio::test]
    async fn test_run_counts_and_continues_past_failures() {
        let plan = vec![change("prod_1"), change("prod_2"), change("prod_3")];
        let mut seen = Vec::new();

        let summary = fast(false)
            .run(plan, |change| {
                seen.push(change.product_id.clone());
                let result = if change.product_id == "prod_2" {
                    Err("boom")
                } else {
                    Ok(())
                };
                async move { result }
            })
            .await;

        assert_eq!(seen, ["prod_1", "prod_2", "prod_3"]);
        assert_eq!(
            summary,
            BatchSummary {
                planned: 3,
                succeeded: 2,
                failed: 1
            }
        );
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_dry_run_applies_nothing() {
        let mut calls = 0;
        let summary = fast(true)
            .run(vec![change("prod_1")], |_| {
                calls += 1;
                async { Ok::<(), &str>(()) }
            })
            .await;

        assert_eq!(calls, 0);
        assert_eq!(summary.planned, 1);
        assert_eq!(summary.succeeded, 0);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let summary = fast(false)
            .run(Vec::new(), |_| async { Ok::<(), &str>(()) })
            .await;
        assert_eq!(summary, BatchSummary::default());
    }

    #[test]
    fn test_change_display() {
        assert_eq!(change("prod_9").to_string(), "Product prod_9 (prod_9): archive");
    }
}
